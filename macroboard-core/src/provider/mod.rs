//! Provider adapters and the degrade-to-diagnostic boundary.
//!
//! The [`SeriesProvider`] trait abstracts over the external sources so the
//! dashboard can be driven by a mock in tests. Providers return structured
//! [`FetchError`]s; [`fetch_or_degrade`] turns those into an empty frame plus
//! a diagnostic so a failing source never aborts a refresh.

pub mod fred;
pub mod http;
pub mod krx;
pub mod yahoo;

pub use fred::FredProvider;
pub use http::HttpClient;
pub use krx::KrxProvider;
pub use yahoo::YahooProvider;

use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::{ProviderKind, TickerDescriptor};
use crate::error::{DashboardError, Diagnostic};
use crate::table::SeriesTable;

/// Structured provider-level failures.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("API key not configured (set {env_var})")]
    MissingApiKey { env_var: &'static str },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

/// Tables returned by one provider for one fetch.
#[derive(Debug, Clone, Default)]
pub struct ProviderFrame {
    /// One column per successfully fetched ticker (prices, rates, flows).
    pub prices: SeriesTable,
    /// Trading volume; only the market-data provider fills this.
    pub volumes: SeriesTable,
    /// Per-symbol warnings and notes gathered during the fetch.
    pub notes: Vec<Diagnostic>,
}

impl ProviderFrame {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// A source of daily time series.
pub trait SeriesProvider {
    fn kind(&self) -> ProviderKind;

    /// Fetch every ticker from `start` up to the latest available date.
    ///
    /// Individual symbol failures should become notes on the frame; an error
    /// is returned only when the provider as a whole could not deliver.
    fn fetch(
        &self,
        tickers: &[TickerDescriptor],
        start: NaiveDate,
    ) -> Result<ProviderFrame, FetchError>;
}

/// Fetch from a provider, never failing.
///
/// Returns the frame and whether it is a genuine result (as opposed to an
/// empty frame standing in for a failure). Failures are logged and recorded
/// as `ProviderUnavailable` diagnostics.
pub fn fetch_or_degrade(
    provider: &dyn SeriesProvider,
    tickers: &[TickerDescriptor],
    start: NaiveDate,
) -> (ProviderFrame, bool) {
    let kind = provider.kind();
    if tickers.is_empty() {
        let note = Diagnostic::info(kind.as_str(), "no tickers configured, skipped");
        return (
            ProviderFrame {
                notes: vec![note],
                ..Default::default()
            },
            false,
        );
    }

    tracing::info!(provider = %kind, tickers = tickers.len(), %start, "fetching");
    match provider.fetch(tickers, start) {
        Ok(mut frame) => {
            if frame.is_empty() {
                frame
                    .notes
                    .push(Diagnostic::warning(kind.as_str(), "provider returned no data"));
            } else {
                frame.notes.push(Diagnostic::info(
                    kind.as_str(),
                    format!(
                        "loaded {} series over {} dates",
                        frame.prices.width(),
                        frame.prices.len()
                    ),
                ));
            }
            (frame, true)
        }
        Err(e) => {
            let err = DashboardError::ProviderUnavailable {
                provider: kind,
                reason: e.to_string(),
            };
            (
                ProviderFrame {
                    notes: vec![Diagnostic::from_error(kind.as_str(), &err)],
                    ..Default::default()
                },
                false,
            )
        }
    }
}
