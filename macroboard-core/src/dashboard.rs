//! Dashboard orchestration: refresh and view.
//!
//! `refresh` is the only step that touches the network. It fetches every
//! provider through the response cache, merges the price tables and returns
//! an immutable [`Snapshot`]. `view` is a pure function of a snapshot and a
//! selection; re-rendering for another period never refetches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::ResponseCache;
use crate::catalog::{Catalog, ProviderKind};
use crate::charts::{resolve_panels, Panel, PanelInputs, FLOW_SERIES, YIELD_SPREAD_LEGS};
use crate::config::DashboardConfig;
use crate::derive::{cumulative_net_flow, spread, zscore_normalize, DerivedSeries, NetFlow, ZScoreOutcome};
use crate::error::{DashboardError, Diagnostic};
use crate::merge::{merge_and_fill, MergeInput};
use crate::period::{DateRange, Period};
use crate::provider::{FredProvider, HttpClient, KrxProvider, ProviderFrame, SeriesProvider, YahooProvider};
use crate::table::SeriesTable;

const SOURCE: &str = "dashboard";

/// Merged data from one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Prices, rates and flows, forward-filled.
    pub prices: SeriesTable,
    /// Trading volume from the market-data provider, not filled.
    pub volumes: SeriesTable,
    pub diagnostics: Vec<Diagnostic>,
    pub fetched_at: DateTime<Utc>,
    /// Hex BLAKE3 digest of the merged tables.
    pub fingerprint: String,
}

impl Snapshot {
    pub fn new(prices: SeriesTable, volumes: SeriesTable, diagnostics: Vec<Diagnostic>) -> Self {
        let fingerprint = fingerprint(&prices, &volumes);
        Self {
            prices,
            volumes,
            diagnostics,
            fetched_at: Utc::now(),
            fingerprint,
        }
    }

    /// First and last date of the merged price index.
    pub fn available_range(&self) -> Option<DateRange> {
        Some(DateRange::new(
            self.prices.first_date()?,
            self.prices.last_date()?,
        ))
    }
}

/// Content hash over dates, column names and values.
///
/// Identical data always gives the same digest, independent of fetch time
/// or diagnostics.
pub fn fingerprint(prices: &SeriesTable, volumes: &SeriesTable) -> String {
    let mut hasher = blake3::Hasher::new();
    for table in [prices, volumes] {
        hasher.update(&(table.len() as u64).to_le_bytes());
        for date in table.dates() {
            hasher.update(date.to_string().as_bytes());
        }
        for col in table.columns() {
            hasher.update(col.name.as_bytes());
            hasher.update(&[0]);
            for v in &col.values {
                match v {
                    Some(x) => {
                        hasher.update(&[1]);
                        hasher.update(&x.to_le_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// What the user picked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub period: Period,
    /// Columns for the z-score comparison; `None` compares every column.
    pub compare: Option<Vec<String>>,
}

impl Selection {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            compare: None,
        }
    }

    pub fn with_compare(mut self, columns: Vec<String>) -> Self {
        self.compare = Some(columns);
        self
    }
}

/// Everything the presentation layer needs for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub period: Period,
    pub range: DateRange,
    pub prices: SeriesTable,
    pub volumes: SeriesTable,
    pub spread: DerivedSeries,
    pub flows: Vec<NetFlow>,
    pub zscore: Option<ZScoreOutcome>,
    pub panels: Vec<Panel>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DashboardView {
    /// True when the selected period holds no rows.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Catalog, providers and cache wired together.
pub struct Dashboard {
    catalog: Catalog,
    providers: Vec<Box<dyn SeriesProvider>>,
    cache: ResponseCache,
    history_start: NaiveDate,
}

impl Dashboard {
    pub fn new(catalog: Catalog, providers: Vec<Box<dyn SeriesProvider>>, cache: ResponseCache) -> Self {
        Self {
            catalog,
            providers,
            cache,
            history_start: DashboardConfig::default().history_start,
        }
    }

    /// Build the live dashboard: the three HTTP providers and a cache with the
    /// configured freshness window.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, DashboardError> {
        let http = HttpClient::new(&config.http).map_err(|e| DashboardError::Config(e.to_string()))?;
        let providers: Vec<Box<dyn SeriesProvider>> = vec![
            Box::new(YahooProvider::new(http.clone())),
            Box::new(FredProvider::new(http.clone(), config.fred_api_key.clone())),
            Box::new(KrxProvider::new(http)),
        ];
        Ok(Self::new(config.catalog()?, providers, ResponseCache::new(config.cache_ttl()))
            .with_history_start(config.history_start))
    }

    pub fn with_history_start(mut self, start: NaiveDate) -> Self {
        self.history_start = start;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn history_start(&self) -> NaiveDate {
        self.history_start
    }

    /// Forget every memoized provider response.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Fetch every provider, merge and audit.
    ///
    /// Provider failures become diagnostics. Fails only when no provider
    /// delivered anything.
    pub fn refresh(&mut self) -> Result<Snapshot, DashboardError> {
        let mut diagnostics = Vec::new();
        let mut frames: Vec<(ProviderKind, ProviderFrame)> = Vec::new();

        for kind in ProviderKind::ALL {
            let tickers = self.catalog.for_provider(kind);
            let Some(provider) = self.providers.iter().find(|p| p.kind() == kind) else {
                if !tickers.is_empty() {
                    diagnostics.push(Diagnostic::warning(
                        kind.as_str(),
                        format!("{} series configured but no provider registered", tickers.len()),
                    ));
                }
                continue;
            };
            let mut frame = self
                .cache
                .get_or_fetch(provider.as_ref(), &tickers, self.history_start);
            diagnostics.append(&mut frame.notes);
            frames.push((kind, frame));
        }

        let flows_loaded = frames
            .iter()
            .any(|(kind, frame)| *kind == ProviderKind::Krx && !frame.is_empty());
        if !flows_loaded && !self.catalog.for_provider(ProviderKind::Krx).is_empty() {
            diagnostics.push(Diagnostic::info(SOURCE, "flow data unavailable"));
        }

        let inputs: Vec<MergeInput<'_>> = frames
            .iter()
            .map(|(kind, frame)| MergeInput::new(kind.as_str(), &frame.prices))
            .collect();
        let merged = match merge_and_fill(&inputs) {
            Ok(merged) => merged,
            Err(e) => {
                diagnostics.iter().for_each(Diagnostic::emit);
                return Err(e);
            }
        };
        diagnostics.extend(merged.diagnostics);

        let volumes = frames
            .iter_mut()
            .find(|(kind, _)| *kind == ProviderKind::Yahoo)
            .map(|(_, frame)| std::mem::take(&mut frame.volumes))
            .unwrap_or_default();

        diagnostics.iter().for_each(Diagnostic::emit);
        let snapshot = Snapshot::new(merged.table, volumes, diagnostics);
        tracing::info!(
            rows = snapshot.prices.len(),
            columns = snapshot.prices.width(),
            fingerprint = %&snapshot.fingerprint[..12],
            "refresh complete"
        );
        Ok(snapshot)
    }

    /// Filter a snapshot to the selected period and compute the derived
    /// series and panels.
    ///
    /// An empty window is reported as a warning, not an error.
    pub fn view(snapshot: &Snapshot, selection: &Selection) -> Result<DashboardView, DashboardError> {
        let available = snapshot.available_range().ok_or(DashboardError::NoDataAvailable)?;
        let range = selection.period.resolve(available.end, available.start)?;
        tracing::debug!(period = %selection.period, %range, "building view");

        let prices = snapshot.prices.filter_range(&range).drop_all_null_rows();
        let volumes = snapshot.volumes.filter_range(&range).drop_all_null_rows();
        let mut diagnostics = Vec::new();

        if prices.is_empty() {
            diagnostics.push(Diagnostic::warning(
                SOURCE,
                format!("no data in the selected period ({range}), choose another period"),
            ));
            return Ok(DashboardView {
                period: selection.period,
                range,
                spread: spread(&prices, YIELD_SPREAD_LEGS.0, YIELD_SPREAD_LEGS.1),
                prices,
                volumes,
                flows: Vec::new(),
                zscore: None,
                panels: Vec::new(),
                diagnostics,
            });
        }

        let yield_spread = spread(&prices, YIELD_SPREAD_LEGS.0, YIELD_SPREAD_LEGS.1);
        let flows: Vec<NetFlow> = FLOW_SERIES
            .iter()
            .filter(|name| prices.has_column(name))
            .map(|name| cumulative_net_flow(&prices, name))
            .collect();

        let compare: Vec<&str> = match &selection.compare {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => prices.column_names(),
        };
        let zscore = match zscore_normalize(&prices, &compare) {
            Ok(outcome) => {
                if !outcome.dropped.is_empty() {
                    diagnostics.push(Diagnostic::warning(
                        SOURCE,
                        format!("not compared (unknown or no data): {}", outcome.dropped.join(", ")),
                    ));
                }
                if !outcome.undefined.is_empty() {
                    diagnostics.push(Diagnostic::info(
                        SOURCE,
                        format!(
                            "constant in the selected period, z-score undefined: {}",
                            outcome.undefined.join(", ")
                        ),
                    ));
                }
                Some(outcome)
            }
            Err(e) => {
                diagnostics.push(Diagnostic::from_error(SOURCE, &e));
                None
            }
        };

        let (panels, mut panel_notes) = resolve_panels(&PanelInputs {
            prices: &prices,
            volumes: &volumes,
            spread: &yield_spread,
            flows: &flows,
            zscores: zscore.as_ref().map(|z| &z.table),
        });
        diagnostics.append(&mut panel_notes);

        Ok(DashboardView {
            period: selection.period,
            range,
            prices,
            volumes,
            spread: yield_spread,
            flows,
            zscore,
            panels,
            diagnostics,
        })
    }
}
