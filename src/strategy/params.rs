// =============================================================================
// Analysis Parameters — the tunables of the pullback pattern
// =============================================================================
//
// Every field carries a serde default so partial JSON (config file or API
// body) fills in the dashboard defaults. Validation is explicit: nothing is
// clamped, an out-of-domain value is a configuration error.
// =============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AnalysisError, Result};
use crate::indicators::SlopeBasis;

/// Number of mid-term simple moving averages.
pub const MID_AVERAGE_COUNT: usize = 3;

fn default_tolerance() -> f64 {
    1e-6
}

fn default_compression_period() -> usize {
    20
}

fn default_compression_threshold() -> f64 {
    0.05
}

fn default_ema_period() -> usize {
    120
}

fn default_ma_long_period() -> usize {
    111
}

fn default_ma_mid_periods() -> Vec<usize> {
    vec![25, 33, 49]
}

/// Parameter set for one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Maximum |EMA slope - long MA slope| for the averages to count as
    /// parallel.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Look-back length, in bars, of the pullback window.
    #[serde(default = "default_compression_period")]
    pub compression_period: usize,

    /// Fractional drop below the previous close that the open must reach.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f64,

    #[serde(default = "default_ema_period")]
    pub ema_period: usize,

    #[serde(default = "default_ma_long_period")]
    pub ma_long_period: usize,

    /// Exactly three mid-term SMA periods, in display order.
    #[serde(default = "default_ma_mid_periods")]
    pub ma_mid_periods: Vec<usize>,

    #[serde(default)]
    pub slope_basis: SlopeBasis,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            compression_period: default_compression_period(),
            compression_threshold: default_compression_threshold(),
            ema_period: default_ema_period(),
            ma_long_period: default_ma_long_period(),
            ma_mid_periods: default_ma_mid_periods(),
            slope_basis: SlopeBasis::default(),
        }
    }
}

impl AnalysisParams {
    /// Reject parameter sets the engine cannot evaluate.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(AnalysisError::configuration(
                "tolerance",
                format!("must be a finite non-negative number, got {}", self.tolerance),
            ));
        }
        if !(self.compression_threshold > 0.0 && self.compression_threshold <= 1.0) {
            return Err(AnalysisError::configuration(
                "compression_threshold",
                format!("must lie in (0, 1], got {}", self.compression_threshold),
            ));
        }
        for (name, period) in [
            ("compression_period", self.compression_period),
            ("ema_period", self.ema_period),
            ("ma_long_period", self.ma_long_period),
        ] {
            if period == 0 {
                return Err(AnalysisError::configuration(name, "must be at least 1"));
            }
        }
        if self.ma_mid_periods.len() != MID_AVERAGE_COUNT {
            return Err(AnalysisError::configuration(
                "ma_mid_periods",
                format!(
                    "expected exactly {MID_AVERAGE_COUNT} periods, got {}",
                    self.ma_mid_periods.len()
                ),
            ));
        }
        if let Some(pos) = self.ma_mid_periods.iter().position(|&p| p == 0) {
            return Err(AnalysisError::configuration(
                "ma_mid_periods",
                format!("period #{} must be at least 1", pos + 1),
            ));
        }
        Ok(())
    }

    /// Shortest series on which every average and the pullback window can be
    /// defined on at least one bar with a slope.
    pub fn required_bars(&self) -> usize {
        let longest_mid = self.ma_mid_periods.iter().copied().max().unwrap_or(0);
        self.ema_period
            .max(self.ma_long_period)
            .max(longest_mid)
            .max(self.compression_period)
            + 1
    }

    /// Stable short hash of the parameter set, used as a cache key.
    ///
    /// Two parameter sets share a fingerprint iff their canonical JSON is
    /// identical.
    pub fn fingerprint(&self) -> String {
        // Serialising plain numbers and strings cannot fail.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        hex::encode(&digest[..8])
    }

    pub fn ema_column(&self) -> String {
        format!("EMA{}", self.ema_period)
    }

    pub fn ma_long_column(&self) -> String {
        format!("MA{}", self.ma_long_period)
    }

    pub fn ma_mid_columns(&self) -> Vec<String> {
        self.ma_mid_periods.iter().map(|p| format!("MA{p}")).collect()
    }
}
