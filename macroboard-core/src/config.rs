//! Dashboard configuration.
//!
//! Loaded in layers: built-in defaults, then an optional TOML file, then
//! environment variables. Every field has a default so an empty file is a
//! valid configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{Catalog, TickerDescriptor};
use crate::error::DashboardError;
use crate::provider::fred::API_KEY_ENV;

/// Overrides the earliest date requested from providers (`YYYY-MM-DD`).
pub const HISTORY_START_ENV: &str = "MACROBOARD_HISTORY_START";

/// HTTP behaviour shared by all provider adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled for each further retry.
    pub base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Earliest date requested from every provider.
    pub history_start: NaiveDate,
    /// How long a provider response stays fresh in the cache.
    pub cache_ttl_secs: u64,
    pub http: HttpConfig,
    /// FRED API key; the environment variable takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fred_api_key: Option<String>,
    /// Replaces the built-in ticker catalog when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<TickerDescriptor>>,
    /// Separate catalog file; ignored when `tickers` is set inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default(),
            cache_ttl_secs: 3600,
            http: HttpConfig::default(),
            fred_api_key: None,
            tickers: None,
            catalog_path: None,
        }
    }
}

impl DashboardConfig {
    pub fn from_toml(content: &str) -> Result<Self, DashboardError> {
        toml::from_str(content).map_err(|e| DashboardError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, DashboardError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, DashboardError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), DashboardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.fred_api_key = Some(key);
        }
        if let Some(raw) = lookup(HISTORY_START_ENV) {
            self.history_start = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                DashboardError::Config(format!("{HISTORY_START_ENV}='{raw}': {e}"))
            })?;
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The configured ticker catalog: inline tickers, then the catalog
    /// file, then the built-in one.
    pub fn catalog(&self) -> Result<Catalog, DashboardError> {
        match (&self.tickers, &self.catalog_path) {
            (Some(tickers), _) => Catalog::new(tickers.clone()),
            (None, Some(path)) => Catalog::from_file(path),
            (None, None) => Ok(Catalog::default_dashboard()),
        }
    }

    pub fn to_toml(&self) -> Result<String, DashboardError> {
        toml::to_string_pretty(self).map_err(|e| DashboardError::Config(e.to_string()))
    }
}
