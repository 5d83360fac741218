//! KRX investor-flow provider.
//!
//! Pulls the daily trading value by investor type from the KRX market data
//! service and keeps the foreign investors' net buy, scaled to billions of
//! won. Catalog symbols are KRX market ids: `STK` (KOSPI), `KSQ` (KOSDAQ).

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::http::HttpClient;
use super::{FetchError, ProviderFrame, SeriesProvider};
use crate::catalog::{ProviderKind, TickerDescriptor};
use crate::error::Diagnostic;
use crate::table::{SeriesPoints, SeriesTable};

const DATA_URL: &str = "http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";
const REFERER: &str = "http://data.krx.co.kr/contents/MDC/MDI/mdiLoader";
/// Daily trend of trading by investor type, whole market.
const BLD_INVESTOR_DAILY: &str = "dbms/MDC/STAT/standard/MDCSTAT02203";

/// Reported values are in won; charts show billions of won.
pub const WON_PER_UNIT: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize)]
struct InvestorResponse {
    output: Vec<InvestorRow>,
}

#[derive(Debug, Deserialize)]
struct InvestorRow {
    /// Trading day, `YYYY/MM/DD`.
    #[serde(rename = "TRD_DD")]
    trade_date: String,
    /// Foreign investors' net buy value, comma-grouped.
    #[serde(rename = "TRDVAL4")]
    foreign_net: String,
}

/// KRX provider.
pub struct KrxProvider {
    http: HttpClient,
}

impl KrxProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn form(market_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("bld", BLD_INVESTOR_DAILY.to_string()),
            ("strtDd", start.format("%Y%m%d").to_string()),
            ("endDd", end.format("%Y%m%d").to_string()),
            ("mktId", market_id.to_string()),
            // trading value, net buy
            ("inqTpCd", "2".to_string()),
            ("trdVolVal", "2".to_string()),
            ("askBid", "3".to_string()),
        ]
    }

    fn fetch_market(
        &self,
        market_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
        let resp: InvestorResponse =
            self.http
                .post_form_json(DATA_URL, REFERER, &Self::form(market_id, start, end))?;
        parse_investor_rows(market_id, resp)
    }
}

impl SeriesProvider for KrxProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Krx
    }

    fn fetch(
        &self,
        tickers: &[TickerDescriptor],
        start: NaiveDate,
    ) -> Result<ProviderFrame, FetchError> {
        let end = Utc::now().date_naive();
        let mut series: Vec<SeriesPoints> = Vec::new();
        let mut notes = Vec::new();
        let mut last_error = None;

        for ticker in tickers {
            match self.fetch_market(&ticker.symbol, start, end) {
                Ok(points) => series.push((ticker.name.clone(), points)),
                Err(e) => {
                    tracing::warn!(market = %ticker.symbol, error = %e, "KRX flow fetch failed");
                    notes.push(Diagnostic::warning(
                        ProviderKind::Krx.as_str(),
                        format!("'{}' ({}) could not be loaded: {e}", ticker.symbol, ticker.name),
                    ));
                    last_error = Some(e);
                }
            }
        }

        if series.is_empty() {
            return Err(last_error.unwrap_or_else(|| FetchError::Other("every market failed".into())));
        }

        Ok(ProviderFrame {
            prices: SeriesTable::from_series(series),
            volumes: SeriesTable::new(),
            notes,
        })
    }
}

/// Parse a comma-grouped won amount (`"-1,234,567"`) into billions of won.
fn parse_won(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().map(|v| v / WON_PER_UNIT)
}

fn parse_investor_rows(
    market_id: &str,
    resp: InvestorResponse,
) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
    if resp.output.is_empty() {
        return Err(FetchError::SymbolNotFound {
            symbol: market_id.to_string(),
        });
    }

    resp.output
        .into_iter()
        .map(|row| {
            let date = NaiveDate::parse_from_str(&row.trade_date, "%Y/%m/%d").map_err(|e| {
                FetchError::ResponseFormatChanged(format!(
                    "{market_id}: bad trade date '{}': {e}",
                    row.trade_date
                ))
            })?;
            Ok((date, parse_won(&row.foreign_net)))
        })
        .collect()
}
