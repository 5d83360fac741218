//! Macroboard Core: the data pipeline behind the macro dashboard.
//!
//! This crate contains everything except rendering:
//! - Ticker catalog (logical series name to provider symbol)
//! - Provider adapters for Yahoo Finance, FRED and KRX behind one trait
//! - TTL response cache
//! - Date-indexed series table with outer join and forward fill
//! - Period selector and derived series (spread, cumulative flow, z-score)
//! - Fixed chart layout, dashboard orchestration and export

pub mod cache;
pub mod catalog;
pub mod charts;
pub mod config;
pub mod dashboard;
pub mod derive;
pub mod error;
pub mod export;
pub mod merge;
pub mod period;
pub mod provider;
pub mod table;

pub use cache::ResponseCache;
pub use catalog::{Catalog, ProviderKind, TickerDescriptor};
pub use config::{DashboardConfig, HttpConfig};
pub use dashboard::{Dashboard, DashboardView, Selection, Snapshot};
pub use error::{DashboardError, Diagnostic, Severity};
pub use export::ExportFormat;
pub use period::{DateRange, Period};
pub use provider::{FetchError, ProviderFrame, SeriesProvider};
pub use table::SeriesTable;
