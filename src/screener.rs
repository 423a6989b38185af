// =============================================================================
// Screener — run the pattern across a universe and rank by signal count
// =============================================================================
//
// Per instrument: cache hit -> reuse; miss -> fetch bars, analyse, cache.
// Any fetch or analysis failure degrades to "zero signals" for that
// instrument (with the error text attached) so one bad symbol never blanks
// the whole screen. Fan-out is bounded by `concurrency`.
// =============================================================================

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::market_data::BarSource;
use crate::signal_cache::{CacheKey, CachedSignals, SignalCache};
use crate::strategy::{self, AnalysisParams};
use crate::types::{DateRange, Interval};

/// A screenable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// One row of a screening result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenEntry {
    pub symbol: String,
    pub name: String,
    pub signal_count: usize,
    pub last_signal: Option<DateTime<Utc>>,
    /// Set when the instrument could not be fetched or analysed.
    pub error: Option<String>,
}

/// What to screen: interval, history window and pattern parameters.
#[derive(Debug, Clone)]
pub struct ScreenRequest {
    pub interval: Interval,
    pub range: DateRange,
    pub params: AnalysisParams,
    pub concurrency: usize,
}

/// Screen `universe` and return entries ranked by signal count (descending),
/// ties broken by symbol.
pub async fn screen<S: BarSource>(
    source: &S,
    universe: &[Instrument],
    request: &ScreenRequest,
    cache: &SignalCache,
) -> Vec<ScreenEntry> {
    let concurrency = request.concurrency.max(1);
    info!(
        instruments = universe.len(),
        interval = %request.interval,
        params = %request.params.fingerprint(),
        concurrency,
        "screening universe"
    );

    let jobs: Vec<_> = universe
        .iter()
        .map(|instrument| screen_one(source, instrument, request, cache))
        .collect();
    let mut entries: Vec<ScreenEntry> = stream::iter(jobs)
        .buffer_unordered(concurrency)
        .collect()
        .await;

    entries.sort_by(|a, b| {
        Reverse(a.signal_count)
            .cmp(&Reverse(b.signal_count))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let with_signals = entries.iter().filter(|e| e.signal_count > 0).count();
    info!(instruments = entries.len(), with_signals, "screening finished");
    entries
}

async fn screen_one<S: BarSource>(
    source: &S,
    instrument: &Instrument,
    request: &ScreenRequest,
    cache: &SignalCache,
) -> ScreenEntry {
    let key = CacheKey::new(&instrument.symbol, request.interval, &request.params);

    let outcome = match cache.get(&key) {
        Some(hit) => {
            debug!(key = %key, "screen cache hit");
            Ok(hit)
        }
        None => evaluate(source, &instrument.symbol, request).await.map(|fresh| {
            cache.insert(key, fresh.clone());
            fresh
        }),
    };

    match outcome {
        Ok(cached) => ScreenEntry {
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            signal_count: cached.signal_count,
            last_signal: cached.signal_timestamps.last().copied(),
            error: None,
        },
        Err(e) => {
            warn!(symbol = %instrument.symbol, error = %e, "screening failed; counting zero signals");
            ScreenEntry {
                symbol: instrument.symbol.clone(),
                name: instrument.name.clone(),
                signal_count: 0,
                last_signal: None,
                error: Some(format!("{e:#}")),
            }
        }
    }
}

async fn evaluate<S: BarSource>(source: &S, symbol: &str, request: &ScreenRequest) -> anyhow::Result<CachedSignals> {
    let series = source.fetch_bars(symbol, request.interval, request.range).await?;
    let analysis = strategy::analyze(&series, &request.params)?;
    Ok(CachedSignals {
        signal_count: analysis.signal_count(),
        signal_timestamps: analysis.signal_timestamps(),
        bars: series.len(),
        computed_at: Utc::now(),
    })
}

/// Keep only instruments that produced at least one signal.
pub fn only_with_signals(entries: &[ScreenEntry]) -> Vec<ScreenEntry> {
    entries.iter().filter(|e| e.signal_count > 0).cloned().collect()
}
