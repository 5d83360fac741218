//! Ticker catalog: which logical series come from which provider.
//!
//! The catalog can be overridden from a TOML file:
//!
//! ```toml
//! [[tickers]]
//! name = "US_10Y_Yield"
//! provider = "yahoo"
//! symbol = "^TNX"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::DashboardError;

/// External data source.
///
/// Variant order is the fetch order of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Market data: prices and volume.
    Yahoo,
    /// Macro data (needs an API key).
    Fred,
    /// Exchange investor flows.
    Krx,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Yahoo, Self::Fred, Self::Krx];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Fred => "fred",
            Self::Krx => "krx",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry: a logical series name bound to a provider symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickerDescriptor {
    /// Column name used everywhere downstream.
    pub name: String,
    pub provider: ProviderKind,
    /// Identifier understood by the provider (`^TNX`, `DFF`, `STK`).
    pub symbol: String,
}

impl TickerDescriptor {
    pub fn new(name: &str, provider: ProviderKind, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            provider,
            symbol: symbol.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    tickers: Vec<TickerDescriptor>,
}

/// The complete ticker catalog. Logical names are unique across providers.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    tickers: Vec<TickerDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting empty or duplicate logical names.
    pub fn new(tickers: Vec<TickerDescriptor>) -> Result<Self, DashboardError> {
        let mut seen = HashSet::new();
        for t in &tickers {
            if t.name.trim().is_empty() {
                return Err(DashboardError::Catalog(format!(
                    "empty series name for {} symbol '{}'",
                    t.provider, t.symbol
                )));
            }
            if !seen.insert(t.name.as_str()) {
                return Err(DashboardError::Catalog(format!(
                    "duplicate series name '{}'",
                    t.name
                )));
            }
        }
        Ok(Self { tickers })
    }

    /// The series shown on the default dashboard.
    pub fn default_dashboard() -> Self {
        use ProviderKind::*;
        let tickers = vec![
            // rates
            TickerDescriptor::new("US_10Y_Yield", Yahoo, "^TNX"),
            TickerDescriptor::new("US_3M_Yield", Yahoo, "^IRX"),
            // credit
            TickerDescriptor::new("High_Yield_Bond", Yahoo, "HYG"),
            TickerDescriptor::new("Inv_Grade_Bond", Yahoo, "LQD"),
            // inflation proxies
            TickerDescriptor::new("Crude_Oil", Yahoo, "CL=F"),
            TickerDescriptor::new("Gold", Yahoo, "GC=F"),
            TickerDescriptor::new("Copper", Yahoo, "HG=F"),
            TickerDescriptor::new("TIPS_ETF", Yahoo, "TIP"),
            // korean indices
            TickerDescriptor::new("KOSPI", Yahoo, "^KS11"),
            TickerDescriptor::new("KOSDAQ", Yahoo, "^KQ11"),
            // AI / tech proxies
            TickerDescriptor::new("Semiconductor_ETF", Yahoo, "SMH"),
            TickerDescriptor::new("Cloud_ETF", Yahoo, "SKYY"),
            TickerDescriptor::new("Fed_Funds", Fred, "DFF"),
            TickerDescriptor::new("10Y_Breakeven", Fred, "T10YIE"),
            TickerDescriptor::new("KOSPI_Foreign_Net", Krx, "STK"),
            TickerDescriptor::new("KOSDAQ_Foreign_Net", Krx, "KSQ"),
        ];
        Self { tickers }
    }

    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DashboardError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Catalog(format!("read catalog file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse a catalog from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DashboardError> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| DashboardError::Catalog(format!("parse catalog TOML: {e}")))?;
        Self::new(file.tickers)
    }

    /// Serialize the catalog to TOML.
    pub fn to_toml(&self) -> Result<String, DashboardError> {
        let file = CatalogFile {
            tickers: self.tickers.clone(),
        };
        toml::to_string_pretty(&file)
            .map_err(|e| DashboardError::Catalog(format!("serialize catalog: {e}")))
    }

    pub fn tickers(&self) -> &[TickerDescriptor] {
        &self.tickers
    }

    /// Entries served by one provider, in catalog order.
    pub fn for_provider(&self, provider: ProviderKind) -> Vec<TickerDescriptor> {
        self.tickers
            .iter()
            .filter(|t| t.provider == provider)
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&TickerDescriptor> {
        self.tickers.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::default_dashboard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_partitioned() {
        let c = Catalog::default_dashboard();
        assert_eq!(c.for_provider(ProviderKind::Yahoo).len(), 12);
        assert_eq!(c.for_provider(ProviderKind::Fred).len(), 2);
        assert_eq!(c.for_provider(ProviderKind::Krx).len(), 2);
        assert_eq!(c.len(), 16);
    }

    #[test]
    fn default_catalog_names_are_unique() {
        let c = Catalog::default_dashboard();
        assert!(Catalog::new(c.tickers().to_vec()).is_ok());
    }

    #[test]
    fn duplicate_name_across_providers_is_rejected() {
        let result = Catalog::new(vec![
            TickerDescriptor::new("Gold", ProviderKind::Yahoo, "GC=F"),
            TickerDescriptor::new("Gold", ProviderKind::Fred, "GOLDAMGBD228NLBM"),
        ]);
        match result {
            Err(DashboardError::Catalog(msg)) => assert!(msg.contains("Gold")),
            other => panic!("expected catalog error, got {other:?}"),
        }
    }

    #[test]
    fn toml_roundtrip() {
        let c = Catalog::default_dashboard();
        let s = c.to_toml().unwrap();
        let parsed = Catalog::from_toml(&s).unwrap();
        assert_eq!(c, parsed);
    }

    #[test]
    fn lookup_by_name() {
        let c = Catalog::default_dashboard();
        let t = c.get("Fed_Funds").unwrap();
        assert_eq!(t.provider, ProviderKind::Fred);
        assert_eq!(t.symbol, "DFF");
        assert!(c.get("Bitcoin").is_none());
    }

    #[test]
    fn parse_hand_written_toml() {
        let content = r#"
            [[tickers]]
            name = "SPY"
            provider = "yahoo"
            symbol = "SPY"

            [[tickers]]
            name = "CPI"
            provider = "fred"
            symbol = "CPIAUCSL"
        "#;
        let c = Catalog::from_toml(content).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.for_provider(ProviderKind::Fred)[0].symbol, "CPIAUCSL");
    }
}
