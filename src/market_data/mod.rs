pub mod bar;
pub mod collector;
pub mod csv_store;
pub mod yahoo;

use std::future::Future;

use anyhow::Result;
use tracing::{debug, warn};

use crate::types::{DateRange, Interval};

pub use bar::{Bar, PriceSeries};
pub use csv_store::CsvStore;
pub use yahoo::YahooClient;

// ---------------------------------------------------------------------------
// BarSource -- anything that can hand the engine a price series
// ---------------------------------------------------------------------------

/// Provider of historical bars for `(symbol, interval, range)`.
///
/// The engine is indifferent to provenance; implementations only have to
/// return a validated [`PriceSeries`].
pub trait BarSource: Send + Sync {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: DateRange,
    ) -> impl Future<Output = Result<PriceSeries>> + Send;
}

// ---------------------------------------------------------------------------
// LocalFirstSource -- CSV store in front of a remote source
// ---------------------------------------------------------------------------

/// Reads the local store first; on a miss fetches from `remote` and writes
/// the result back. A failed write-back is logged and does not fail the
/// fetch.
pub struct LocalFirstSource<R> {
    store: CsvStore,
    remote: R,
}

impl<R: BarSource> LocalFirstSource<R> {
    pub fn new(store: CsvStore, remote: R) -> Self {
        Self { store, remote }
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }
}

impl<R: BarSource> BarSource for LocalFirstSource<R> {
    async fn fetch_bars(&self, symbol: &str, interval: Interval, range: DateRange) -> Result<PriceSeries> {
        if let Some(series) = self.store.load(symbol, interval, range)? {
            debug!(symbol, %interval, bars = series.len(), "served from local store");
            return Ok(series);
        }

        let series = self.remote.fetch_bars(symbol, interval, range).await?;
        if let Err(e) = self.store.save(symbol, interval, range, &series) {
            warn!(symbol, %interval, error = %e, "failed to write fetched bars to local store");
        }
        Ok(series)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory source shared by the screener, collector and API tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use chrono::{Duration, TimeZone, Utc};

    use super::{Bar, BarSource, PriceSeries};
    use crate::types::{DateRange, Interval};

    /// Serves canned series by symbol and counts calls; unknown symbols fail.
    #[derive(Default)]
    pub struct StaticSource {
        pub series: HashMap<String, PriceSeries>,
        pub calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn with(mut self, symbol: &str, series: PriceSeries) -> Self {
            self.series.insert(symbol.to_string(), series);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl BarSource for StaticSource {
        async fn fetch_bars(&self, symbol: &str, _interval: Interval, _range: DateRange) -> Result<PriceSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.series
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow!("no data for {symbol}"))
        }
    }

    /// Daily uptrend (close = 100 + i) with optional gap-down opens at the
    /// given bar indices.
    pub fn uptrend_with_pullbacks(n: usize, pullbacks: &[usize]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                let mut open = if i == 0 { close } else { close - 1.0 };
                if pullbacks.contains(&i) {
                    open = (close - 1.0) * 0.8;
                }
                Bar::new(start + Duration::days(i as i64), open, close + 0.5, close - 0.5, close, 1_000.0)
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    pub fn range() -> DateRange {
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DateRange::new(end - Duration::days(365), end)
    }
}
