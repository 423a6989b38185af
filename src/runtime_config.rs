// =============================================================================
// Runtime Configuration — screener settings with atomic save
// =============================================================================
//
// Everything the service can be retuned with at runtime lives here: the
// pattern parameters, the bar interval, the instrument universe and the
// pacing of remote fetches.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::screener::Instrument;
use crate::strategy::AnalysisParams;
use crate::types::Interval;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_universe() -> Vec<Instrument> {
    [
        // Technology
        ("AAPL", "Apple Inc."),
        ("MSFT", "Microsoft"),
        ("GOOGL", "Alphabet (Google)"),
        ("AMZN", "Amazon"),
        ("META", "Meta Platforms"),
        ("NVDA", "NVIDIA"),
        ("TSLA", "Tesla"),
        ("INTC", "Intel"),
        ("AMD", "Advanced Micro Devices"),
        ("CRM", "Salesforce"),
        ("ADBE", "Adobe"),
        ("ORCL", "Oracle"),
        ("CSCO", "Cisco"),
        // Financials
        ("JPM", "JPMorgan Chase"),
        ("BAC", "Bank of America"),
        ("WFC", "Wells Fargo"),
        ("GS", "Goldman Sachs"),
        ("V", "Visa"),
        ("MA", "Mastercard"),
        // Consumer
        ("KO", "Coca-Cola"),
        ("PEP", "PepsiCo"),
        ("SBUX", "Starbucks"),
        ("NKE", "Nike"),
        ("DIS", "Disney"),
        ("NFLX", "Netflix"),
        ("WMT", "Walmart"),
        ("COST", "Costco"),
        ("TGT", "Target"),
        // Healthcare
        ("JNJ", "Johnson & Johnson"),
        ("PFE", "Pfizer"),
        ("MRNA", "Moderna"),
        ("UNH", "UnitedHealth"),
        ("ABT", "Abbott Laboratories"),
        // Telecom
        ("T", "AT&T"),
        ("VZ", "Verizon"),
        // Energy
        ("XOM", "ExxonMobil"),
        ("CVX", "Chevron"),
        // Industrials
        ("BA", "Boeing"),
        ("CAT", "Caterpillar"),
        ("GE", "General Electric"),
        ("MMM", "3M"),
        // Autos
        ("F", "Ford"),
        ("GM", "General Motors"),
        // Semiconductors
        ("TSM", "Taiwan Semiconductor"),
        ("QCOM", "Qualcomm"),
        ("TXN", "Texas Instruments"),
        // Gaming
        ("EA", "Electronic Arts"),
        ("TTWO", "Take-Two Interactive"),
        // Platforms & payments
        ("ZM", "Zoom"),
        ("UBER", "Uber"),
        ("ABNB", "Airbnb"),
        ("SQ", "Block (Square)"),
        ("PYPL", "PayPal"),
        ("SHOP", "Shopify"),
    ]
    .into_iter()
    .map(|(symbol, name)| Instrument::new(symbol, name))
    .collect()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_screen_concurrency() -> usize {
    4
}

fn default_fetch_delay_ms() -> u64 {
    1000
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the screener.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Pattern -------------------------------------------------------------

    /// Parameters handed to the signal engine.
    #[serde(default)]
    pub params: AnalysisParams,

    /// Bar interval used for screening and single-instrument analysis.
    #[serde(default)]
    pub interval: Interval,

    // --- Universe ------------------------------------------------------------

    /// Instruments screened on every refresh.
    #[serde(default = "default_universe")]
    pub universe: Vec<Instrument>,

    // --- Data & pacing -------------------------------------------------------

    /// Directory of the local CSV bar store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum instruments fetched/analysed at once while screening.
    #[serde(default = "default_screen_concurrency")]
    pub screen_concurrency: usize,

    /// Pause between symbols during a bulk `collect` run.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    /// Period of the background re-screen.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            params: AnalysisParams::default(),
            interval: Interval::default(),
            universe: default_universe(),
            data_dir: default_data_dir(),
            screen_concurrency: default_screen_concurrency(),
            fetch_delay_ms: default_fetch_delay_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .params
            .validate()
            .with_context(|| format!("invalid analysis parameters in {}", path.display()))?;

        info!(
            path = %path.display(),
            instruments = config.universe.len(),
            interval = %config.interval,
            params = %config.params.fingerprint(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Load `path`, or start from defaults when no file exists yet.
    ///
    /// A file that exists but cannot be read, parsed or validated is an
    /// error: falling back would overwrite it with defaults on the next save.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "runtime config not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Replace the universe with bare symbols from a comma-separated list
    /// (`SCREENER_SYMBOLS`). Known symbols keep their display names.
    pub fn apply_symbol_override(&mut self, list: &str) {
        let universe: Vec<Instrument> = list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .map(|symbol| {
                let name = self
                    .universe
                    .iter()
                    .find(|i| i.symbol == symbol)
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| symbol.clone());
                Instrument::new(symbol, name)
            })
            .collect();

        if !universe.is_empty() {
            self.universe = universe;
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        self.universe.iter().map(|i| i.symbol.clone()).collect()
    }
}
