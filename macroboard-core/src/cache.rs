//! In-memory response cache with a freshness window.
//!
//! Entries are keyed by provider, the set of requested symbols and the start
//! date. Only genuine, non-empty provider frames are stored, so a failed
//! fetch is retried on the next refresh instead of being replayed for an
//! hour.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::catalog::{ProviderKind, TickerDescriptor};
use crate::error::Diagnostic;
use crate::provider::{fetch_or_degrade, ProviderFrame, SeriesProvider};

/// Identity of one provider request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: ProviderKind,
    /// Provider symbols, order-insensitive.
    pub symbols: BTreeSet<String>,
    pub start: NaiveDate,
}

impl CacheKey {
    pub fn new(provider: ProviderKind, tickers: &[TickerDescriptor], start: NaiveDate) -> Self {
        Self {
            provider,
            symbols: tickers.iter().map(|t| t.symbol.clone()).collect(),
            start,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    stored_at: Instant,
    frame: ProviderFrame,
}

/// TTL-bounded memoization of provider responses.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh entry for `key`, if any. Stale entries are evicted.
    pub fn get(&mut self, key: &CacheKey) -> Option<&ProviderFrame> {
        let fresh = self
            .entries
            .get(key)
            .is_some_and(|e| e.stored_at.elapsed() < self.ttl);
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.frame)
    }

    pub fn insert(&mut self, key: CacheKey, frame: ProviderFrame) {
        self.entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                frame,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        let n = self.entries.len();
        self.entries.clear();
        tracing::info!(entries = n, "response cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serve from cache or fetch through the degrade boundary.
    ///
    /// Never fails; a failed fetch yields an empty frame with diagnostics
    /// and is not stored.
    pub fn get_or_fetch(
        &mut self,
        provider: &dyn SeriesProvider,
        tickers: &[TickerDescriptor],
        start: NaiveDate,
    ) -> ProviderFrame {
        let kind = provider.kind();
        let key = CacheKey::new(kind, tickers, start);

        if let Some(frame) = self.get(&key) {
            tracing::debug!(provider = %kind, "cache hit");
            let mut frame = frame.clone();
            frame
                .notes
                .push(Diagnostic::info(kind.as_str(), "served from cache"));
            return frame;
        }

        tracing::debug!(provider = %kind, "cache miss");
        let (frame, genuine) = fetch_or_degrade(provider, tickers, start);
        if genuine && !frame.is_empty() {
            self.insert(key, frame.clone());
        }
        frame
    }
}

impl Default for ResponseCache {
    /// One hour.
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FetchError;
    use crate::table::SeriesTable;
    use std::cell::Cell;

    struct Counting {
        calls: Cell<usize>,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Self {
            Self {
                calls: Cell::new(0),
                fail,
            }
        }
    }

    impl SeriesProvider for Counting {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Yahoo
        }

        fn fetch(
            &self,
            tickers: &[TickerDescriptor],
            start: NaiveDate,
        ) -> Result<ProviderFrame, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(FetchError::NetworkUnreachable("offline".into()));
            }
            let series = tickers
                .iter()
                .map(|t| (t.name.clone(), vec![(start, Some(1.0))]))
                .collect();
            Ok(ProviderFrame {
                prices: SeriesTable::from_series(series),
                ..Default::default()
            })
        }
    }

    fn tickers() -> Vec<TickerDescriptor> {
        vec![
            TickerDescriptor::new("Gold", ProviderKind::Yahoo, "GC=F"),
            TickerDescriptor::new("TIPS_ETF", ProviderKind::Yahoo, "TIP"),
        ]
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
    }

    #[test]
    fn second_fetch_within_ttl_is_a_hit() {
        let provider = Counting::new(false);
        let mut cache = ResponseCache::default();

        let first = cache.get_or_fetch(&provider, &tickers(), start());
        let second = cache.get_or_fetch(&provider, &tickers(), start());

        assert_eq!(provider.calls.get(), 1);
        assert_eq!(first.prices, second.prices);
        assert!(second.notes.iter().any(|n| n.message == "served from cache"));
    }

    #[test]
    fn zero_ttl_always_refetches() {
        let provider = Counting::new(false);
        let mut cache = ResponseCache::new(Duration::ZERO);

        cache.get_or_fetch(&provider, &tickers(), start());
        cache.get_or_fetch(&provider, &tickers(), start());
        assert_eq!(provider.calls.get(), 2);
    }

    #[test]
    fn clear_forces_refetch() {
        let provider = Counting::new(false);
        let mut cache = ResponseCache::default();

        cache.get_or_fetch(&provider, &tickers(), start());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        cache.get_or_fetch(&provider, &tickers(), start());
        assert_eq!(provider.calls.get(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let provider = Counting::new(true);
        let mut cache = ResponseCache::default();

        let frame = cache.get_or_fetch(&provider, &tickers(), start());
        assert!(frame.is_empty());
        assert!(cache.is_empty());
        cache.get_or_fetch(&provider, &tickers(), start());
        assert_eq!(provider.calls.get(), 2);
    }

    #[test]
    fn key_ignores_ticker_order_but_not_start() {
        let mut reversed = tickers();
        reversed.reverse();
        let a = CacheKey::new(ProviderKind::Yahoo, &tickers(), start());
        let b = CacheKey::new(ProviderKind::Yahoo, &reversed, start());
        let c = CacheKey::new(
            ProviderKind::Yahoo,
            &tickers(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
