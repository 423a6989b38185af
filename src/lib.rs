// =============================================================================
// Pullback Screener
// =============================================================================
//
// Detects the "parallel averages + positive momentum + pullback breakout"
// pattern on OHLCV series and screens a universe of instruments for it.
//
//   strategy      pure signal engine (`analyze`)
//   indicators    EMA / SMA / slope / trailing max primitives
//   market_data   bars, Yahoo chart client, CSV store, bulk collector
//   screener      concurrent universe screen ranked by signal count
//   signal_cache  results keyed by (symbol, interval, params fingerprint)
//   api           axum REST surface over `AppState`
// =============================================================================

pub mod api;
pub mod app_state;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod screener;
pub mod signal_cache;
pub mod strategy;
pub mod types;

pub use error::{AnalysisError, Result};
pub use market_data::{Bar, BarSource, PriceSeries};
pub use strategy::{analyze, AnalysisParams, SignalAnalysis};
pub use types::{DateRange, Interval};
