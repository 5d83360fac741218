//! Derived series computed over the filtered window.
//!
//! All three transforms are stateless and request-scoped. None of them fail
//! hard: a missing input gives an empty result, and a degenerate column gives
//! nulls instead of a division by zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::table::{Column, SeriesTable};

/// A named list of `(date, value)` points in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSeries {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

impl DerivedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }
}

/// Pointwise `a - b` over the dates where both are present.
///
/// Empty if either series is absent from the table.
pub fn spread(table: &SeriesTable, a: &str, b: &str) -> DerivedSeries {
    let name = format!("{a} - {b}");
    let (Some(left), Some(right)) = (table.column(a), table.column(b)) else {
        return DerivedSeries {
            name,
            points: Vec::new(),
        };
    };

    let points = table
        .dates()
        .iter()
        .zip(left.iter().zip(right))
        .filter_map(|(date, pair)| match pair {
            (Some(x), Some(y)) => Some((*date, x - y)),
            _ => None,
        })
        .collect();

    DerivedSeries { name, points }
}

/// Daily net values together with their running sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetFlow {
    pub daily: DerivedSeries,
    pub cumulative: DerivedSeries,
}

/// Drop nulls from a daily net-flow column, then accumulate in index order.
pub fn cumulative_net_flow(table: &SeriesTable, name: &str) -> NetFlow {
    let daily = table.non_null(name);
    let cumulative = daily
        .iter()
        .scan(0.0, |acc, (date, v)| {
            *acc += v;
            Some((*date, *acc))
        })
        .collect();

    NetFlow {
        daily: DerivedSeries {
            name: name.to_string(),
            points: daily,
        },
        cumulative: DerivedSeries {
            name: format!("{name} (cumulative)"),
            points: cumulative,
        },
    }
}

/// Output of [`zscore_normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZScoreOutcome {
    /// Normalized columns on the window's index.
    pub table: SeriesTable,
    /// Columns whose standard deviation is zero or undefined (emitted as nulls).
    pub undefined: Vec<String>,
    /// Requested columns that were dropped: unknown, or entirely null in the window.
    pub dropped: Vec<String>,
}

/// Mean and sample standard deviation of the present values.
///
/// `None` when fewer than two values exist, the values are constant, or the
/// deviation is not a positive finite number.
pub fn mean_and_std(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() < 2 {
        return None;
    }
    let first = present[0];
    if present.iter().all(|v| *v == first) {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std.is_finite() && std > 0.0 {
        Some((mean, std))
    } else {
        None
    }
}

/// Z-score normalize the selected columns over this window only.
///
/// Columns missing from the table or entirely null are dropped first. If
/// nothing remains, returns [`DashboardError::EmptyNormalization`].
pub fn zscore_normalize(
    table: &SeriesTable,
    columns: &[&str],
) -> Result<ZScoreOutcome, DashboardError> {
    let mut dropped = Vec::new();
    let mut undefined = Vec::new();
    let mut normalized = Vec::new();

    for name in columns {
        let values = match table.column(name) {
            Some(v) if v.iter().any(Option::is_some) => v,
            _ => {
                dropped.push(name.to_string());
                continue;
            }
        };

        let out = match mean_and_std(values) {
            Some((mean, std)) => values.iter().map(|v| v.map(|x| (x - mean) / std)).collect(),
            None => {
                undefined.push(name.to_string());
                vec![None; values.len()]
            }
        };
        normalized.push(Column {
            name: name.to_string(),
            values: out,
        });
    }

    if normalized.is_empty() {
        return Err(DashboardError::EmptyNormalization);
    }

    let table = SeriesTable::from_columns(table.dates().to_vec(), normalized)
        .ok_or(DashboardError::EmptyNormalization)?;

    Ok(ZScoreOutcome {
        table,
        undefined,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn table(cols: &[(&str, &[Option<f64>])]) -> SeriesTable {
        let n = cols[0].1.len();
        let dates = (1..=n as u32).map(d).collect();
        let columns = cols
            .iter()
            .map(|(name, values)| Column {
                name: name.to_string(),
                values: values.to_vec(),
            })
            .collect();
        SeriesTable::from_columns(dates, columns).unwrap()
    }

    #[test]
    fn spread_of_aligned_series() {
        let t = table(&[
            ("A", &[Some(10.0), Some(11.0), Some(12.0)]),
            ("B", &[Some(3.0), Some(3.0), Some(4.0)]),
        ]);
        let s = spread(&t, "A", "B");
        assert_eq!(s.values(), vec![7.0, 8.0, 8.0]);
        assert_eq!(s.name, "A - B");
    }

    #[test]
    fn spread_skips_rows_with_a_missing_leg() {
        let t = table(&[
            ("A", &[Some(10.0), None, Some(12.0)]),
            ("B", &[Some(3.0), Some(3.0), None]),
        ]);
        let s = spread(&t, "A", "B");
        assert_eq!(s.points, vec![(d(1), 7.0)]);
    }

    #[test]
    fn spread_with_absent_series_is_empty() {
        let t = table(&[("A", &[Some(1.0)])]);
        assert!(spread(&t, "A", "B").is_empty());
        assert!(spread(&t, "B", "A").is_empty());
    }

    #[test]
    fn cumulative_flow_drops_nulls_and_accumulates() {
        let t = table(&[("F", &[Some(1.0), None, Some(-3.0), Some(2.0)])]);
        let flow = cumulative_net_flow(&t, "F");
        assert_eq!(flow.daily.values(), vec![1.0, -3.0, 2.0]);
        assert_eq!(flow.cumulative.values(), vec![1.0, -2.0, 0.0]);
        assert_eq!(flow.cumulative.points[1].0, d(3));
    }

    #[test]
    fn cumulative_flow_of_absent_column_is_empty() {
        let t = table(&[("F", &[Some(1.0)])]);
        let flow = cumulative_net_flow(&t, "G");
        assert!(flow.daily.is_empty());
        assert!(flow.cumulative.is_empty());
    }

    #[test]
    fn zscore_uses_sample_std() {
        let t = table(&[("A", &[Some(1.0), Some(2.0), Some(3.0)])]);
        let out = zscore_normalize(&t, &["A"]).unwrap();
        let z = out.table.column("A").unwrap();
        // mean 2, sample std 1
        assert_eq!(z, &[Some(-1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn zscore_constant_column_is_null() {
        let t = table(&[
            ("C", &[Some(0.1), Some(0.1), Some(0.1)]),
            ("A", &[Some(1.0), Some(2.0), Some(3.0)]),
        ]);
        let out = zscore_normalize(&t, &["C", "A"]).unwrap();
        assert_eq!(out.table.column("C").unwrap(), &[None, None, None]);
        assert_eq!(out.undefined, vec!["C".to_string()]);
    }

    #[test]
    fn zscore_single_point_is_null() {
        let t = table(&[("A", &[None, Some(5.0), None])]);
        let out = zscore_normalize(&t, &["A"]).unwrap();
        assert_eq!(out.table.column("A").unwrap(), &[None, None, None]);
    }

    #[test]
    fn zscore_drops_all_null_and_unknown_columns() {
        let t = table(&[
            ("A", &[Some(1.0), Some(3.0)]),
            ("Dead", &[None, None]),
        ]);
        let out = zscore_normalize(&t, &["A", "Dead", "Nope"]).unwrap();
        assert_eq!(out.table.column_names(), vec!["A"]);
        assert_eq!(out.dropped, vec!["Dead".to_string(), "Nope".to_string()]);
    }

    #[test]
    fn zscore_with_nothing_valid_is_empty_normalization() {
        let t = table(&[("Dead", &[None, None])]);
        assert!(matches!(
            zscore_normalize(&t, &["Dead"]),
            Err(DashboardError::EmptyNormalization)
        ));
        assert!(matches!(
            zscore_normalize(&t, &[]),
            Err(DashboardError::EmptyNormalization)
        ));
    }

    #[test]
    fn zscore_keeps_nulls_in_place() {
        let t = table(&[("A", &[Some(1.0), None, Some(3.0)])]);
        let out = zscore_normalize(&t, &["A"]).unwrap();
        let z = out.table.column("A").unwrap();
        assert!(z[1].is_none());
        assert!((z[0].unwrap() + z[2].unwrap()).abs() < 1e-12);
    }
}
