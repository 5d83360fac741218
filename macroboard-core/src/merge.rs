//! Merge-and-fill: combine the provider tables into one date-indexed table.
//!
//! Empty inputs are skipped. The non-empty ones are outer-joined in order,
//! forward-filled per column, then audited for columns that never received
//! a value.

use crate::error::{DashboardError, Diagnostic};
use crate::table::SeriesTable;

const SOURCE: &str = "merge";

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: SeriesTable,
    /// Columns with no value anywhere in the requested range (kept, not dropped).
    pub empty_columns: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A labelled input table (label is the provider name, used in diagnostics).
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    pub label: &'a str,
    pub table: &'a SeriesTable,
}

impl<'a> MergeInput<'a> {
    pub fn new(label: &'a str, table: &'a SeriesTable) -> Self {
        Self { label, table }
    }
}

/// Outer-join the inputs on date, forward-fill, and audit.
///
/// Fails with [`DashboardError::NoDataAvailable`] only when every input is
/// empty (including when there are no inputs).
pub fn merge_and_fill(inputs: &[MergeInput<'_>]) -> Result<MergeOutcome, DashboardError> {
    let mut diagnostics = Vec::new();

    let present: Vec<&MergeInput<'_>> = inputs.iter().filter(|i| !i.table.is_empty()).collect();
    for skipped in inputs.iter().filter(|i| i.table.is_empty()) {
        tracing::debug!(source = skipped.label, "skipping empty input");
        diagnostics.push(Diagnostic::warning(
            SOURCE,
            format!("{}: no data loaded, continuing without it", skipped.label),
        ));
    }

    let Some((first, rest)) = present.split_first() else {
        return Err(DashboardError::NoDataAvailable);
    };

    let mut table = first.table.clone();
    for input in rest {
        let (joined, collisions) = table.outer_join(input.table);
        for name in collisions {
            diagnostics.push(Diagnostic::warning(
                SOURCE,
                format!(
                    "column '{name}' supplied twice; keeping the earlier values and filling gaps from {}",
                    input.label
                ),
            ));
        }
        table = joined;
    }

    let labels: Vec<&str> = present.iter().map(|i| i.label).collect();
    diagnostics.push(Diagnostic::info(
        SOURCE,
        format!(
            "merged {} of {} sources ({})",
            present.len(),
            inputs.len(),
            labels.join(", ")
        ),
    ));

    table.forward_fill();

    let empty_columns: Vec<String> = table
        .all_null_columns()
        .into_iter()
        .map(String::from)
        .collect();
    if !empty_columns.is_empty() {
        diagnostics.push(Diagnostic::warning(
            SOURCE,
            format!(
                "no data for the full requested range: {}",
                empty_columns.join(", ")
            ),
        ));
    }

    tracing::info!(
        rows = table.len(),
        columns = table.width(),
        empty = empty_columns.len(),
        "merge complete"
    );

    Ok(MergeOutcome {
        table,
        empty_columns,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::table::Column;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn table(name: &str, days: &[u32], base: f64) -> SeriesTable {
        SeriesTable::from_series(vec![(
            name.to_string(),
            days.iter()
                .enumerate()
                .map(|(i, &day)| (d(day), Some(base + i as f64)))
                .collect(),
        )])
    }

    #[test]
    fn all_empty_is_no_data() {
        let empty = SeriesTable::new();
        let inputs = [
            MergeInput::new("yahoo", &empty),
            MergeInput::new("fred", &empty),
            MergeInput::new("krx", &empty),
        ];
        assert!(matches!(
            merge_and_fill(&inputs),
            Err(DashboardError::NoDataAvailable)
        ));
        assert!(matches!(
            merge_and_fill(&[]),
            Err(DashboardError::NoDataAvailable)
        ));
    }

    #[test]
    fn overlapping_ranges_are_unioned_and_filled() {
        let a = table("A", &[1, 2, 3, 4, 5], 10.0);
        let b = table("B", &[3, 4, 5, 6, 7], 20.0);
        let out = merge_and_fill(&[MergeInput::new("a", &a), MergeInput::new("b", &b)]).unwrap();

        let expected: Vec<NaiveDate> = (1..=7).map(d).collect();
        assert_eq!(out.table.dates(), expected.as_slice());

        let col_a = out.table.column("A").unwrap();
        assert_eq!(col_a[4], Some(14.0));
        assert_eq!(col_a[5], Some(14.0));
        assert_eq!(col_a[6], Some(14.0));

        // leading gap of B stays null
        let col_b = out.table.column("B").unwrap();
        assert_eq!(col_b[0], None);
        assert_eq!(col_b[1], None);
        assert_eq!(col_b[2], Some(20.0));
    }

    #[test]
    fn single_non_empty_input_is_passed_through() {
        let a = table("A", &[1, 2, 3], 1.0);
        let empty = SeriesTable::new();
        let out = merge_and_fill(&[
            MergeInput::new("yahoo", &empty),
            MergeInput::new("fred", &a),
            MergeInput::new("krx", &empty),
        ])
        .unwrap();
        assert_eq!(out.table, a);
        let warnings = out
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        assert_eq!(warnings, 2);
    }

    #[test]
    fn all_null_columns_are_reported_not_dropped() {
        let a = SeriesTable::from_columns(
            vec![d(1), d(2)],
            vec![
                Column {
                    name: "A".into(),
                    values: vec![Some(1.0), Some(2.0)],
                },
                Column {
                    name: "Dead".into(),
                    values: vec![None, None],
                },
            ],
        )
        .unwrap();
        let out = merge_and_fill(&[MergeInput::new("yahoo", &a)]).unwrap();
        assert_eq!(out.empty_columns, vec!["Dead".to_string()]);
        assert!(out.table.has_column("Dead"));
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.message.contains("Dead")));
    }

    #[test]
    fn collision_is_diagnosed() {
        let a = table("X", &[1], 1.0);
        let b = table("X", &[2], 2.0);
        let out = merge_and_fill(&[MergeInput::new("a", &a), MergeInput::new("b", &b)]).unwrap();
        assert_eq!(out.table.width(), 1);
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.message.contains("supplied twice")));
    }

    #[test]
    fn table_with_dates_but_no_columns_counts_as_empty() {
        let hollow = SeriesTable::from_columns(vec![d(1)], Vec::<Column>::new()).unwrap();
        assert!(matches!(
            merge_and_fill(&[MergeInput::new("krx", &hollow)]),
            Err(DashboardError::NoDataAvailable)
        ));
    }
}
