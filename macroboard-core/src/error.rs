//! Dashboard error taxonomy and user-facing diagnostics.
//!
//! Errors are split by where they stop the flow:
//! - provider failures are downgraded to diagnostics at the adapter boundary
//! - `NoDataAvailable` ends the current refresh
//! - `InvalidRange` ends the current view
//! - `EmptyNormalization` is informational and only skips the comparison chart

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::catalog::ProviderKind;

/// Errors surfaced by the dashboard pipeline.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: ProviderKind,
        reason: String,
    },

    #[error("no data available from any provider (check network access and API keys)")]
    NoDataAvailable,

    #[error("start date {start} is after end date {end} (corrupt data?)")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no selected series has data in the chosen period")]
    EmptyNormalization,

    #[error("unknown period '{0}' (expected one of 1m, 3m, 6m, ytd, 1y, 3y, 10y, all)")]
    UnknownPeriod(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("export error: {0}")]
    Export(String),
}

impl DashboardError {
    /// How loudly this error should be reported to the user.
    pub fn severity(&self) -> Severity {
        match self {
            Self::EmptyNormalization => Severity::Info,
            Self::ProviderUnavailable { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A human-readable message collected during a refresh or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Component or provider that emitted the message.
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, source, message)
    }

    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, source, message)
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, source, message)
    }

    fn new(severity: Severity, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            source: source.into(),
            message: message.into(),
        }
    }

    /// Build a diagnostic from an error, keeping the error's severity.
    pub fn from_error(source: impl Into<String>, err: &DashboardError) -> Self {
        Self::new(err.severity(), source, err.to_string())
    }

    /// Forward this diagnostic to the tracing subscriber.
    pub fn emit(&self) {
        match self.severity {
            Severity::Info => tracing::info!(source = %self.source, "{}", self.message),
            Severity::Warning => tracing::warn!(source = %self.source, "{}", self.message),
            Severity::Error => tracing::error!(source = %self.source, "{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.source, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_propagation_policy() {
        assert_eq!(DashboardError::EmptyNormalization.severity(), Severity::Info);
        assert_eq!(
            DashboardError::ProviderUnavailable {
                provider: ProviderKind::Fred,
                reason: "no key".into(),
            }
            .severity(),
            Severity::Warning
        );
        assert_eq!(DashboardError::NoDataAvailable.severity(), Severity::Error);
    }

    #[test]
    fn invalid_range_message_names_both_bounds() {
        let err = DashboardError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-02-01"));
        assert!(msg.contains("2024-01-01"));
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::warning("fred", "API key not set");
        assert_eq!(d.to_string(), "[warn] fred: API key not set");
    }
}
