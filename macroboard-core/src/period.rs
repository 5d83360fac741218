//! Period selector: map a named window to a concrete date range.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.start, self.end)
    }
}

/// A named look-back window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "ytd")]
    Ytd,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "3y")]
    ThreeYears,
    #[serde(rename = "10y")]
    TenYears,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl Period {
    /// All periods in display order.
    pub const ALL: [Period; 8] = [
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::Ytd,
        Self::OneYear,
        Self::ThreeYears,
        Self::TenYears,
        Self::All,
    ];

    /// Short token accepted on the command line.
    pub fn token(&self) -> &'static str {
        match self {
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::Ytd => "ytd",
            Self::OneYear => "1y",
            Self::ThreeYears => "3y",
            Self::TenYears => "10y",
            Self::All => "all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OneMonth => "1 month",
            Self::ThreeMonths => "3 months",
            Self::SixMonths => "6 months",
            Self::Ytd => "year to date",
            Self::OneYear => "1 year",
            Self::ThreeYears => "3 years",
            Self::TenYears => "10 years",
            Self::All => "all available",
        }
    }

    /// Calendar months to look back, for the fixed-length windows.
    fn months_back(&self) -> Option<u32> {
        match self {
            Self::OneMonth => Some(1),
            Self::ThreeMonths => Some(3),
            Self::SixMonths => Some(6),
            Self::OneYear => Some(12),
            Self::ThreeYears => Some(36),
            Self::TenYears => Some(120),
            Self::Ytd | Self::All => None,
        }
    }

    /// Start of the window ending at `end`, never earlier than `min`.
    ///
    /// Month arithmetic clamps the day to the end of the target month
    /// (03-31 minus one month is 02-29 in a leap year).
    pub fn start_date(&self, end: NaiveDate, min: NaiveDate) -> NaiveDate {
        let raw = match self {
            Self::All => min,
            // Jan 1 always exists
            Self::Ytd => NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(min),
            other => other
                .months_back()
                .and_then(|m| end.checked_sub_months(Months::new(m)))
                .unwrap_or(min),
        };
        raw.max(min)
    }

    /// Resolve to a validated range `[start, end]`.
    pub fn resolve(&self, end: NaiveDate, min: NaiveDate) -> Result<DateRange, DashboardError> {
        let start = self.start_date(end, min);
        if start > end {
            return Err(DashboardError::InvalidRange { start, end });
        }
        Ok(DateRange::new(start, end))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Period {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1mo" => Ok(Self::OneMonth),
            "3m" | "3mo" => Ok(Self::ThreeMonths),
            "6m" | "6mo" => Ok(Self::SixMonths),
            "ytd" => Ok(Self::Ytd),
            "1y" => Ok(Self::OneYear),
            "3y" => Ok(Self::ThreeYears),
            "10y" => Ok(Self::TenYears),
            "all" | "max" => Ok(Self::All),
            _ => Err(DashboardError::UnknownPeriod(s.to_string())),
        }
    }
}
