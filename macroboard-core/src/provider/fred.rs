//! FRED macro-data provider (St. Louis Fed observations API).
//!
//! Requires an API key. Without one the provider reports
//! `MissingApiKey` and the refresh carries on with the other sources.

use chrono::NaiveDate;
use serde::Deserialize;

use super::http::HttpClient;
use super::{FetchError, ProviderFrame, SeriesProvider};
use crate::catalog::{ProviderKind, TickerDescriptor};
use crate::error::Diagnostic;
use crate::table::{SeriesPoints, SeriesTable};

const OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "FRED_API_KEY";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    /// Numeric string, or "." for a missing observation.
    value: String,
}

/// FRED provider.
pub struct FredProvider {
    http: HttpClient,
    api_key: Option<String>,
}

impl FredProvider {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Self { http, api_key }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn fetch_series(
        &self,
        api_key: &str,
        series_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
        let query = [
            ("series_id", series_id.to_string()),
            ("api_key", api_key.to_string()),
            ("file_type", "json".to_string()),
            ("observation_start", start.format("%Y-%m-%d").to_string()),
        ];
        let resp: ObservationsResponse = self
            .http
            .get_json(OBSERVATIONS_URL, &query)
            .map_err(|e| match e {
                // FRED answers 400 for an unregistered key
                FetchError::Http { status: 400, message } if message.contains("api_key") => {
                    FetchError::AuthenticationRequired(
                        "FRED API key is not valid, check FRED_API_KEY".into(),
                    )
                }
                FetchError::Http { status: 400, .. } => FetchError::SymbolNotFound {
                    symbol: series_id.to_string(),
                },
                other => other,
            })?;
        parse_observations(series_id, resp)
    }
}

impl SeriesProvider for FredProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fred
    }

    fn fetch(
        &self,
        tickers: &[TickerDescriptor],
        start: NaiveDate,
    ) -> Result<ProviderFrame, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey {
            env_var: API_KEY_ENV,
        })?;

        let mut series: Vec<SeriesPoints> = Vec::new();
        let mut notes = Vec::new();
        let mut last_error = None;

        for ticker in tickers {
            match self.fetch_series(api_key, &ticker.symbol, start) {
                Ok(points) => series.push((ticker.name.clone(), points)),
                // a bad key fails every series the same way
                Err(e @ FetchError::AuthenticationRequired(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(series = %ticker.symbol, error = %e, "FRED series failed");
                    notes.push(Diagnostic::warning(
                        ProviderKind::Fred.as_str(),
                        format!("'{}' ({}) could not be loaded: {e}", ticker.symbol, ticker.name),
                    ));
                    last_error = Some(e);
                }
            }
        }

        if series.is_empty() {
            return Err(last_error.unwrap_or_else(|| FetchError::Other("every series failed".into())));
        }

        Ok(ProviderFrame {
            prices: SeriesTable::from_series(series),
            volumes: SeriesTable::new(),
            notes,
        })
    }
}

fn parse_observations(
    series_id: &str,
    resp: ObservationsResponse,
) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
    let mut points = Vec::with_capacity(resp.observations.len());
    for obs in resp.observations {
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
            FetchError::ResponseFormatChanged(format!("{series_id}: bad date '{}': {e}", obs.date))
        })?;
        let value = obs.value.trim().parse::<f64>().ok();
        points.push((date, value));
    }

    if points.iter().all(|(_, v)| v.is_none()) {
        return Err(FetchError::SymbolNotFound {
            symbol: series_id.to_string(),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    fn parse(json: &str) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
        let resp: ObservationsResponse = serde_json::from_str(json).unwrap();
        parse_observations("DFF", resp)
    }

    #[test]
    fn dot_is_a_missing_observation() {
        let points = parse(
            r#"{"realtime_start":"2024-07-01","observations":[
                {"realtime_start":"2024-07-01","date":"2024-07-01","value":"5.33"},
                {"realtime_start":"2024-07-01","date":"2024-07-04","value":"."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].1, Some(5.33));
        assert_eq!(points[1].1, None);
    }

    #[test]
    fn all_missing_is_not_found() {
        let result = parse(r#"{"observations":[{"date":"2024-07-04","value":"."}]}"#);
        assert!(matches!(result, Err(FetchError::SymbolNotFound { .. })));
    }

    #[test]
    fn bad_date_is_format_change() {
        let result = parse(r#"{"observations":[{"date":"07/04/2024","value":"1"}]}"#);
        assert!(matches!(result, Err(FetchError::ResponseFormatChanged(_))));
    }

    #[test]
    fn missing_key_fails_without_network() {
        let http = HttpClient::new(&HttpConfig::default()).unwrap();
        let provider = FredProvider::new(http, Some("   ".into()));
        assert!(!provider.has_api_key());

        let tickers = vec![TickerDescriptor::new("Fed_Funds", ProviderKind::Fred, "DFF")];
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        match provider.fetch(&tickers, start) {
            Err(FetchError::MissingApiKey { env_var }) => assert_eq!(env_var, API_KEY_ENV),
            other => panic!("expected MissingApiKey, got {other:?}"),
        }
    }
}
