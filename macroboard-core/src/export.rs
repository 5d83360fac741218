//! Export of the current view (CSV / Parquet / JSON) and the tail preview.
//!
//! Tabular formats go through a polars `DataFrame` with a `date` column
//! followed by one nullable `f64` column per series. JSON serializes the
//! whole view, derived series and panels included.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use crate::dashboard::DashboardView;
use crate::error::DashboardError;
use crate::table::SeriesTable;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" | "pq" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            other => Err(DashboardError::Export(format!(
                "unknown format '{other}' (expected csv, parquet or json)"
            ))),
        }
    }
}

fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Convert a series table to a DataFrame: `date` then one column per series.
pub fn to_dataframe(table: &SeriesTable) -> Result<DataFrame, DashboardError> {
    let days: Vec<i32> = table.dates().iter().map(|d| epoch_days(*d)).collect();
    let mut columns = Vec::with_capacity(table.width() + 1);
    columns.push(
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DashboardError::Export(format!("date cast: {e}")))?,
    );
    for col in table.columns() {
        columns.push(Column::new(col.name.as_str().into(), col.values.clone()));
    }
    DataFrame::new(columns).map_err(|e| DashboardError::Export(format!("dataframe creation: {e}")))
}

fn create(path: &Path) -> Result<File, DashboardError> {
    File::create(path)
        .map_err(|e| DashboardError::Export(format!("cannot create {}: {e}", path.display())))
}

pub fn write_csv(table: &SeriesTable, path: &Path) -> Result<(), DashboardError> {
    let mut df = to_dataframe(table)?;
    let mut file = create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| DashboardError::Export(format!("write csv: {e}")))
}

pub fn write_parquet(table: &SeriesTable, path: &Path) -> Result<(), DashboardError> {
    let mut df = to_dataframe(table)?;
    let mut file = create(path)?;
    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .map(|_| ())
        .map_err(|e| DashboardError::Export(format!("write parquet: {e}")))
}

pub fn write_json(view: &DashboardView, path: &Path) -> Result<(), DashboardError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, view)
        .map_err(|e| DashboardError::Export(format!("write json: {e}")))
}

/// Write a view. CSV and Parquet carry the filtered price table; JSON
/// carries the whole view.
pub fn export_view(view: &DashboardView, path: &Path, format: ExportFormat) -> Result<(), DashboardError> {
    match format {
        ExportFormat::Csv => write_csv(&view.prices, path)?,
        ExportFormat::Parquet => write_parquet(&view.prices, path)?,
        ExportFormat::Json => write_json(view, path)?,
    }
    tracing::info!(path = %path.display(), %format, rows = view.prices.len(), "view exported");
    Ok(())
}

/// The last `n` rows rendered as a polars table.
pub fn tail_preview(table: &SeriesTable, n: usize) -> Result<String, DashboardError> {
    let df = to_dataframe(&table.tail(n))?;
    Ok(df.to_string())
}
