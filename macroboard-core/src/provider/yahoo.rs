//! Yahoo Finance market-data provider.
//!
//! Fetches daily closes and volume from the v8 chart API, one request per
//! symbol. Adjusted closes are preferred; plain closes are used when the
//! response carries no adjusted series (indices, futures).
//!
//! Yahoo has no official API and changes its response format without
//! notice, so every parse failure is reported as `ResponseFormatChanged`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::http::HttpClient;
use super::{FetchError, ProviderFrame, SeriesProvider};
use crate::catalog::{ProviderKind, TickerDescriptor};
use crate::error::Diagnostic;
use crate::table::{SeriesPoints, SeriesTable};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Parsed daily series for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub closes: Vec<(NaiveDate, Option<f64>)>,
    pub volumes: Vec<(NaiveDate, Option<f64>)>,
    /// Whether `closes` holds adjusted closes.
    pub adjusted: bool,
}

/// Yahoo Finance provider.
pub struct YahooProvider {
    http: HttpClient,
}

impl YahooProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn chart_query(start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
        let start_ts = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp()).unwrap_or(0);
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(start_ts);
        vec![
            ("period1", start_ts.to_string()),
            ("period2", end_ts.to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ]
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ChartSeries, FetchError> {
        let url = format!("{CHART_URL}/{symbol}");
        let chart: ChartResponse = self.http.get_json(&url, &Self::chart_query(start, end))?;
        parse_chart(symbol, chart)
    }
}

impl SeriesProvider for YahooProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Yahoo
    }

    fn fetch(
        &self,
        tickers: &[TickerDescriptor],
        start: NaiveDate,
    ) -> Result<ProviderFrame, FetchError> {
        let end = Utc::now().date_naive();
        let mut prices: Vec<SeriesPoints> = Vec::new();
        let mut volumes: Vec<SeriesPoints> = Vec::new();
        let mut notes = Vec::new();
        let mut last_error = None;
        let mut unadjusted = Vec::new();

        for ticker in tickers {
            match self.fetch_symbol(&ticker.symbol, start, end) {
                Ok(series) => {
                    tracing::debug!(symbol = %ticker.symbol, rows = series.closes.len(), "chart loaded");
                    if !series.adjusted {
                        unadjusted.push(ticker.name.clone());
                    }
                    prices.push((ticker.name.clone(), series.closes));
                    if series.volumes.iter().any(|(_, v)| v.is_some()) {
                        volumes.push((ticker.name.clone(), series.volumes));
                    }
                }
                Err(e) => {
                    tracing::warn!(symbol = %ticker.symbol, error = %e, "chart fetch failed");
                    notes.push(Diagnostic::warning(
                        ProviderKind::Yahoo.as_str(),
                        format!("'{}' ({}) could not be loaded: {e}", ticker.symbol, ticker.name),
                    ));
                    last_error = Some(e);
                }
            }
        }

        if prices.is_empty() {
            return Err(last_error.unwrap_or_else(|| FetchError::Other("no symbols loaded".into())));
        }

        if !unadjusted.is_empty() {
            notes.push(Diagnostic::info(
                ProviderKind::Yahoo.as_str(),
                format!("using plain closes (no adjusted close): {}", unadjusted.join(", ")),
            ));
        }

        Ok(ProviderFrame {
            prices: SeriesTable::from_series(prices),
            volumes: SeriesTable::from_series(volumes),
            notes,
        })
    }
}

/// Parse a chart API response into dated closes and volumes.
///
/// Timestamps are shifted by the exchange's UTC offset before taking the
/// calendar date, so a Seoul session maps to its local trading day.
/// Rows where both close and volume are missing (holidays) are skipped.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<ChartSeries, FetchError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => {
            FetchError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
        }
        None => FetchError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::ResponseFormatChanged("result array is empty".into()))?;

    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

    let timestamps = data
        .timestamp
        .ok_or_else(|| FetchError::ResponseFormatChanged("no timestamps".into()))?;

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::ResponseFormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .filter(|v| v.iter().any(Option::is_some));
    let adjusted = adj_closes.is_some();

    let mut closes = Vec::with_capacity(timestamps.len());
    let mut volumes = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = ts
            .checked_add(offset)
            .and_then(|local| DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let close = match &adj_closes {
            Some(adj) => adj.get(i).copied().flatten(),
            None => quote.close.get(i).copied().flatten(),
        };
        let volume = quote.volume.get(i).copied().flatten();

        if close.is_none() && volume.is_none() {
            continue;
        }

        closes.push((date, close));
        volumes.push((date, volume));
    }

    if closes.is_empty() {
        return Err(FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }

    Ok(ChartSeries {
        closes,
        volumes,
        adjusted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(symbol: &str, json: &str) -> Result<ChartSeries, FetchError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        parse_chart(symbol, resp)
    }

    // 2024-01-02 and 2024-01-03 at 14:30 UTC (US open)
    const US_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"gmtoffset": -18000},
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open": [1.0, 2.0, null],
                        "close": [470.0, 468.0, null],
                        "volume": [1000, 1100, null]
                    }],
                    "adjclose": [{"adjclose": [465.0, 463.0, null]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn adjusted_close_is_preferred() {
        let s = parse("SPY", US_CHART).unwrap();
        assert!(s.adjusted);
        assert_eq!(s.closes.len(), 2);
        assert_eq!(s.closes[0].0, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(s.closes[0].1, Some(465.0));
        assert_eq!(s.volumes[1].1, Some(1100.0));
    }

    #[test]
    fn plain_close_without_adjclose() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704205800],
                    "indicators": {"quote": [{"close": [4.0], "volume": [0]}]}
                }],
                "error": null
            }
        }"#;
        let s = parse("^TNX", json).unwrap();
        assert!(!s.adjusted);
        assert_eq!(s.closes[0].1, Some(4.0));
    }

    #[test]
    fn exchange_offset_gives_local_trading_day() {
        // 2024-01-02 00:00 UTC is 09:00 in Seoul (+9h); 2024-01-01 23:30 UTC is 08:30 on 01-02
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 32400},
                    "timestamp": [1704151800],
                    "indicators": {"quote": [{"close": [2655.0], "volume": [500]}]}
                }],
                "error": null
            }
        }"#;
        let s = parse("^KS11", json).unwrap();
        assert_eq!(s.closes[0].0, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn not_found_maps_to_symbol_not_found() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        match parse("NOPE", json) {
            Err(FetchError::SymbolNotFound { symbol }) => assert_eq!(symbol, "NOPE"),
            other => panic!("expected SymbolNotFound, got {other:?}"),
        }
    }

    #[test]
    fn all_null_rows_means_no_data() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704205800],
                    "indicators": {"quote": [{"close": [null], "volume": [null]}]}
                }],
                "error": null
            }
        }"#;
        assert!(matches!(
            parse("X", json),
            Err(FetchError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn missing_timestamps_is_format_change() {
        let json = r#"{
            "chart": {
                "result": [{"indicators": {"quote": [{"close": [], "volume": []}]}}],
                "error": null
            }
        }"#;
        assert!(matches!(
            parse("X", json),
            Err(FetchError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn query_spans_whole_days() {
        let q = YahooProvider::chart_query(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert_eq!(q[0], ("period1", "1704067200".to_string()));
        assert_eq!(q[1], ("period2", "1704153599".to_string()));
    }

    #[test]
    fn out_of_range_offset_is_a_format_change() {
        let json = US_CHART.replace("-18000", "9223372036854775807");
        assert!(matches!(
            parse("SPY", &json),
            Err(FetchError::ResponseFormatChanged(_))
        ));
    }
}
