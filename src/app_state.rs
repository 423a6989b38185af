// =============================================================================
// Central Application State — Pullback Screener
// =============================================================================
//
// Ties the runtime config, the bar source and the signal cache together and
// owns the most recent screening snapshot served by the API.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared values. Guards are never
//     held across an `.await`; callers clone what they need first.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::market_data::{BarSource, LocalFirstSource, YahooClient};
use crate::runtime_config::RuntimeConfig;
use crate::screener::{self, Instrument, ScreenEntry, ScreenRequest};
use crate::signal_cache::SignalCache;
use crate::strategy::{self, AnalysisParams, SignalAnalysis};
use crate::types::{DateRange, Interval};

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Records & snapshots
// =============================================================================

/// A recorded error event for the API error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// The tunables exposed through `GET/PUT /settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub params: AnalysisParams,
    #[serde(default)]
    pub interval: Interval,
}

/// Result of the most recent universe screen.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenSnapshot {
    pub generated_at: DateTime<Utc>,
    pub interval: Interval,
    pub params_fingerprint: String,
    pub entries: Vec<ScreenEntry>,
}

/// Service health summary.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub state_version: u64,
    pub uptime_secs: u64,
    pub instruments: usize,
    pub cached_results: usize,
    pub last_screen_at: Option<DateTime<Utc>>,
    pub recent_errors: Vec<ErrorRecord>,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared state handed to every handler and background task via `Arc`.
pub struct AppState<S = LocalFirstSource<YahooClient>> {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every settings change, cache invalidation and
    /// completed screen.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub config: RwLock<RuntimeConfig>,
    /// Where settings changes are persisted (best-effort).
    pub config_path: PathBuf,

    // ── Data & results ──────────────────────────────────────────────────
    pub source: S,
    pub cache: SignalCache,
    pub last_screen: RwLock<Option<ScreenSnapshot>>,

    // ── Error log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl<S: BarSource> AppState<S> {
    pub fn new(config: RuntimeConfig, config_path: impl Into<PathBuf>, source: S) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config: RwLock::new(config),
            config_path: config_path.into(),
            source,
            cache: SignalCache::new(),
            last_screen: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message; oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Settings ────────────────────────────────────────────────────────

    pub fn settings(&self) -> Settings {
        let config = self.config.read();
        Settings {
            params: config.params.clone(),
            interval: config.interval,
        }
    }

    /// Validate and apply new settings, then persist the config.
    ///
    /// Cached results need no flush: a different parameter set or interval
    /// produces a different cache key.
    pub fn update_settings(&self, settings: Settings) -> std::result::Result<Settings, AnalysisError> {
        settings.params.validate()?;

        let snapshot = {
            let mut config = self.config.write();
            config.params = settings.params.clone();
            config.interval = settings.interval;
            config.clone()
        };

        if let Err(e) = snapshot.save(&self.config_path) {
            warn!(error = %e, "failed to persist settings");
        }

        self.increment_version();
        info!(
            interval = %settings.interval,
            params = %settings.params.fingerprint(),
            "settings updated"
        );
        Ok(settings)
    }

    // ── Cache ───────────────────────────────────────────────────────────

    /// Drop cached results for one symbol, or everything when `symbol` is
    /// `None`. Returns the number of entries removed.
    pub fn invalidate(&self, symbol: Option<&str>) -> usize {
        let removed = match symbol {
            Some(s) => self.cache.invalidate_symbol(s),
            None => self.cache.clear(),
        };
        self.increment_version();
        info!(symbol = ?symbol, removed, "signal cache invalidated");
        removed
    }

    // ── Screening & analysis ────────────────────────────────────────────

    fn screen_request(&self) -> (ScreenRequest, Vec<Instrument>) {
        let config = self.config.read();
        let request = ScreenRequest {
            interval: config.interval,
            range: DateRange::default_for(config.interval, Utc::now()),
            params: config.params.clone(),
            concurrency: config.screen_concurrency,
        };
        (request, config.universe.clone())
    }

    /// Screen the configured universe and publish the result as the latest
    /// snapshot.
    pub async fn refresh(&self) -> ScreenSnapshot {
        let (request, universe) = self.screen_request();
        let entries = screener::screen(&self.source, &universe, &request, &self.cache).await;

        for entry in &entries {
            if let Some(err) = &entry.error {
                self.push_error(format!("{}: {err}", entry.symbol));
            }
        }

        let snapshot = ScreenSnapshot {
            generated_at: Utc::now(),
            interval: request.interval,
            params_fingerprint: request.params.fingerprint(),
            entries,
        };
        *self.last_screen.write() = Some(snapshot.clone());
        self.increment_version();
        snapshot
    }

    /// Full analysis of one instrument under the current settings.
    pub async fn analyze_symbol(&self, symbol: &str) -> Result<(Settings, SignalAnalysis)> {
        let settings = self.settings();
        let range = DateRange::default_for(settings.interval, Utc::now());
        let series = self.source.fetch_bars(symbol, settings.interval, range).await?;
        let analysis = strategy::analyze(&series, &settings.params)?;
        Ok((settings, analysis))
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    pub fn build_health(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok",
            state_version: self.current_state_version(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            instruments: self.config.read().universe.len(),
            cached_results: self.cache.len(),
            last_screen_at: self.last_screen.read().as_ref().map(|s| s.generated_at),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}
