//! Date-indexed table of named numeric columns.
//!
//! The index is a strictly increasing list of calendar dates. Every column
//! has exactly one slot per index date; `None` marks a missing value.
//! Tickers that were never fetched are absent columns, not null columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::period::DateRange;

/// One named column of a [`SeriesTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    /// True if the column has no value at all.
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// A date-indexed table of named numeric series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct SeriesTable {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

/// Unchecked wire form; deserialized tables go through [`SeriesTable::from_columns`].
#[derive(Deserialize)]
struct RawTable {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for SeriesTable {
    type Error = String;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        SeriesTable::from_columns(raw.dates, raw.columns).ok_or_else(|| {
            "dates must be strictly increasing and every column must match their length"
                .to_string()
        })
    }
}

/// Named points for a single series, as produced by a provider.
pub type SeriesPoints = (String, Vec<(NaiveDate, Option<f64>)>);

impl SeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Align several single-series point lists onto the union of their dates.
    ///
    /// Points are sorted by date; on duplicate dates the last point wins.
    /// Non-finite values are stored as missing. Series with the same name are
    /// coalesced, the earlier one taking precedence.
    pub fn from_series(series: Vec<SeriesPoints>) -> Self {
        let mut all_dates = BTreeSet::new();
        let mut by_name: Vec<(String, BTreeMap<NaiveDate, Option<f64>>)> = Vec::new();

        for (name, points) in series {
            let mut map = BTreeMap::new();
            for (date, value) in points {
                all_dates.insert(date);
                map.insert(date, value.filter(|v| v.is_finite()));
            }
            match by_name.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => {
                    for (date, value) in map {
                        let slot = existing.entry(date).or_insert(None);
                        if slot.is_none() {
                            *slot = value;
                        }
                    }
                }
                None => by_name.push((name, map)),
            }
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let columns = by_name
            .into_iter()
            .map(|(name, map)| Column {
                values: dates
                    .iter()
                    .map(|d| map.get(d).copied().flatten())
                    .collect(),
                name,
            })
            .collect();

        Self { dates, columns }
    }

    /// Build a table from an already-aligned index and columns.
    ///
    /// Returns `None` if the index is not strictly increasing or a column
    /// length differs from the index length.
    pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<Column>) -> Option<Self> {
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        if columns.iter().any(|c| c.values.len() != dates.len()) {
            return None;
        }
        Some(Self { dates, columns })
    }

    /// True if the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The non-null `(date, value)` pairs of a column, in index order.
    pub fn non_null(&self, name: &str) -> Vec<(NaiveDate, f64)> {
        self.column(name)
            .map(|values| {
                self.dates
                    .iter()
                    .zip(values)
                    .filter_map(|(d, v)| v.map(|v| (*d, v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Outer join on the date index.
    ///
    /// Every date of either table appears in the result. On a column-name
    /// collision the left column keeps its values and its gaps are filled
    /// from the right column; the colliding names are returned.
    pub fn outer_join(&self, other: &SeriesTable) -> (SeriesTable, Vec<String>) {
        let dates: Vec<NaiveDate> = self
            .dates
            .iter()
            .chain(other.dates.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let reindex = |table: &SeriesTable, col: &Column| -> Vec<Option<f64>> {
            let lookup: BTreeMap<NaiveDate, Option<f64>> = table
                .dates
                .iter()
                .copied()
                .zip(col.values.iter().copied())
                .collect();
            dates
                .iter()
                .map(|d| lookup.get(d).copied().flatten())
                .collect()
        };

        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: reindex(self, c),
            })
            .collect();

        let mut collisions = Vec::new();
        for col in &other.columns {
            let values = reindex(other, col);
            match columns.iter_mut().find(|c| c.name == col.name) {
                Some(existing) => {
                    collisions.push(col.name.clone());
                    for (slot, v) in existing.values.iter_mut().zip(values) {
                        if slot.is_none() {
                            *slot = v;
                        }
                    }
                }
                None => columns.push(Column {
                    name: col.name.clone(),
                    values,
                }),
            }
        }

        (SeriesTable { dates, columns }, collisions)
    }

    /// Carry the last known value forward, per column.
    ///
    /// Leading gaps stay null. Applying this twice changes nothing.
    pub fn forward_fill(&mut self) {
        for col in &mut self.columns {
            let mut last = None;
            for slot in &mut col.values {
                match slot {
                    Some(v) => last = Some(*v),
                    None => *slot = last,
                }
            }
        }
    }

    /// Names of columns with no value at any date.
    pub fn all_null_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_all_null())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Rows whose date lies in `range` (inclusive on both ends).
    pub fn filter_range(&self, range: &DateRange) -> SeriesTable {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| range.contains(**d))
            .map(|(i, _)| i)
            .collect();
        self.take_rows(&keep)
    }

    /// Drop rows where every column is null.
    pub fn drop_all_null_rows(&self) -> SeriesTable {
        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|&i| self.columns.iter().any(|c| c.values[i].is_some()))
            .collect();
        self.take_rows(&keep)
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> SeriesTable {
        let start = self.dates.len().saturating_sub(n);
        let keep: Vec<usize> = (start..self.dates.len()).collect();
        self.take_rows(&keep)
    }

    fn take_rows(&self, rows: &[usize]) -> SeriesTable {
        SeriesTable {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: rows.iter().map(|&i| c.values[i]).collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(name: &str, points: &[(&str, f64)]) -> SeriesPoints {
        (
            name.to_string(),
            points.iter().map(|(date, v)| (d(date), Some(*v))).collect(),
        )
    }

    #[test]
    fn from_series_aligns_on_union_of_dates() {
        let t = SeriesTable::from_series(vec![
            series("SPY", &[("2024-01-02", 1.0), ("2024-01-03", 2.0)]),
            series("QQQ", &[("2024-01-03", 5.0), ("2024-01-04", 6.0)]),
        ]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.column("SPY").unwrap(), &[Some(1.0), Some(2.0), None]);
        assert_eq!(t.column("QQQ").unwrap(), &[None, Some(5.0), Some(6.0)]);
    }

    #[test]
    fn from_series_sorts_and_dedupes_dates() {
        let t = SeriesTable::from_series(vec![series(
            "X",
            &[("2024-01-03", 3.0), ("2024-01-02", 2.0), ("2024-01-03", 4.0)],
        )]);
        assert_eq!(t.dates(), &[d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(t.column("X").unwrap(), &[Some(2.0), Some(4.0)]);
    }

    #[test]
    fn non_finite_values_are_missing() {
        let t = SeriesTable::from_series(vec![(
            "X".into(),
            vec![(d("2024-01-02"), Some(f64::NAN)), (d("2024-01-03"), Some(1.0))],
        )]);
        assert_eq!(t.column("X").unwrap(), &[None, Some(1.0)]);
    }

    #[test]
    fn from_columns_rejects_bad_shapes() {
        let dates = vec![d("2024-01-02"), d("2024-01-03")];
        let short = Column {
            name: "X".into(),
            values: vec![Some(1.0)],
        };
        assert!(SeriesTable::from_columns(dates.clone(), vec![short]).is_none());

        let unsorted = vec![d("2024-01-03"), d("2024-01-02")];
        assert!(SeriesTable::from_columns(unsorted, vec![]).is_none());
    }

    #[test]
    fn outer_join_keeps_every_date() {
        let a = SeriesTable::from_series(vec![series("A", &[("2024-01-01", 1.0)])]);
        let b = SeriesTable::from_series(vec![series("B", &[("2024-01-05", 2.0)])]);
        let (joined, collisions) = a.outer_join(&b);
        assert!(collisions.is_empty());
        assert_eq!(joined.dates(), &[d("2024-01-01"), d("2024-01-05")]);
        assert_eq!(joined.column("A").unwrap(), &[Some(1.0), None]);
        assert_eq!(joined.column("B").unwrap(), &[None, Some(2.0)]);
    }

    #[test]
    fn outer_join_collision_prefers_left() {
        let a = SeriesTable::from_series(vec![series("X", &[("2024-01-01", 1.0)])]);
        let b = SeriesTable::from_series(vec![series(
            "X",
            &[("2024-01-01", 9.0), ("2024-01-02", 2.0)],
        )]);
        let (joined, collisions) = a.outer_join(&b);
        assert_eq!(collisions, vec!["X".to_string()]);
        assert_eq!(joined.width(), 1);
        assert_eq!(joined.column("X").unwrap(), &[Some(1.0), Some(2.0)]);
    }

    #[test]
    fn forward_fill_leaves_leading_gaps() {
        let mut t = SeriesTable::from_series(vec![
            series("A", &[("2024-01-01", 1.0), ("2024-01-03", 3.0)]),
            series("B", &[("2024-01-02", 7.0)]),
        ]);
        t.forward_fill();
        assert_eq!(t.column("A").unwrap(), &[Some(1.0), Some(1.0), Some(3.0)]);
        assert_eq!(t.column("B").unwrap(), &[None, Some(7.0), Some(7.0)]);
    }

    #[test]
    fn filter_and_drop_all_null_rows() {
        let t = SeriesTable::from_series(vec![
            series("A", &[("2024-01-01", 1.0), ("2024-01-03", 3.0)]),
            series("B", &[("2024-01-03", 7.0), ("2024-01-09", 8.0)]),
        ]);
        let range = DateRange::new(d("2024-01-01"), d("2024-01-03"));
        let filtered = t.filter_range(&range);
        assert_eq!(filtered.dates(), &[d("2024-01-01"), d("2024-01-03")]);

        let sparse = SeriesTable::from_columns(
            vec![d("2024-01-01"), d("2024-01-02")],
            vec![Column {
                name: "A".into(),
                values: vec![None, Some(1.0)],
            }],
        )
        .unwrap();
        assert_eq!(sparse.drop_all_null_rows().dates(), &[d("2024-01-02")]);
    }

    #[test]
    fn tail_and_all_null_columns() {
        let dates = vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03")];
        let t = SeriesTable::from_columns(
            dates,
            vec![
                Column {
                    name: "A".into(),
                    values: vec![Some(1.0), Some(2.0), Some(3.0)],
                },
                Column {
                    name: "EMPTY".into(),
                    values: vec![None, None, None],
                },
            ],
        )
        .unwrap();

        assert_eq!(t.all_null_columns(), vec!["EMPTY"]);
        assert_eq!(t.tail(2).dates(), &[d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(t.tail(10).len(), 3);
    }

    #[test]
    fn empty_table_semantics() {
        assert!(SeriesTable::new().is_empty());
        let no_columns =
            SeriesTable::from_columns(vec![d("2024-01-01")], vec![]).unwrap();
        assert!(no_columns.is_empty());
        assert!(SeriesTable::new().non_null("A").is_empty());
    }

    #[test]
    fn deserialize_checks_shape() {
        let ok: SeriesTable = serde_json::from_str(
            r#"{"dates":["2024-01-01","2024-01-02"],"columns":[{"name":"A","values":[1.0,null]}]}"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.column("A").unwrap(), &[Some(1.0), None]);

        let ragged = r#"{"dates":["2024-01-01","2024-01-02"],"columns":[{"name":"A","values":[1.0]}]}"#;
        assert!(serde_json::from_str::<SeriesTable>(ragged).is_err());

        let unsorted = r#"{"dates":["2024-01-02","2024-01-01"],"columns":[{"name":"A","values":[1.0,2.0]}]}"#;
        assert!(serde_json::from_str::<SeriesTable>(unsorted).is_err());
    }

    #[test]
    fn serialized_table_reads_back() {
        let t = SeriesTable::from_series(vec![(
            "A".to_string(),
            vec![(d("2024-01-01"), Some(1.0)), (d("2024-01-03"), None)],
        )]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(serde_json::from_str::<SeriesTable>(&json).unwrap(), t);
    }
}
