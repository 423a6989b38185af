// =============================================================================
// Signal Cache — memoised screening results
// =============================================================================
//
// Keyed by (symbol, interval, parameter fingerprint). Changing any parameter
// yields a new key, so stale entries are never served; dropping them is the
// caller's job (`invalidate_symbol`, `clear`).
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::strategy::AnalysisParams;
use crate::types::Interval;

/// Identity of one cached screening result.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct CacheKey {
    pub symbol: String,
    pub interval: Interval,
    pub params_fingerprint: String,
}

impl CacheKey {
    pub fn new(symbol: &str, interval: Interval, params: &AnalysisParams) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            interval,
            params_fingerprint: params.fingerprint(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.symbol, self.interval, self.params_fingerprint)
    }
}

/// What the screener needs to rank an instrument without re-running it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedSignals {
    pub signal_count: usize,
    pub signal_timestamps: Vec<DateTime<Utc>>,
    pub bars: usize,
    pub computed_at: DateTime<Utc>,
}

/// Thread-safe map of screening results.
#[derive(Default)]
pub struct SignalCache {
    entries: RwLock<HashMap<CacheKey, CachedSignals>>,
}

impl SignalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedSignals> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: CachedSignals) {
        self.entries.write().insert(key, value);
    }

    /// Drop every entry for `symbol` (all intervals and parameter sets).
    /// Returns the number of entries removed.
    pub fn invalidate_symbol(&self, symbol: &str) -> usize {
        let symbol = symbol.to_uppercase();
        let mut map = self.entries.write();
        let before = map.len();
        map.retain(|k, _| k.symbol != symbol);
        before - map.len()
    }

    /// Drop everything. Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let mut map = self.entries.write();
        let removed = map.len();
        map.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
