// =============================================================================
// Analysis Errors — typed failures of the signal engine
// =============================================================================
//
// Two families:
//   - Configuration: the parameter set is unusable (rejected before any
//     computation, never clamped).
//   - Malformed input: the price series violates the bar/series invariants.
//
// A short series is *not* an error: see `strategy::InsufficientData`.
// =============================================================================

use thiserror::Error;

/// Failures surfaced by parameter validation, series construction and the
/// signal engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A parameter is outside its allowed domain.
    #[error("invalid parameter `{parameter}`: {reason}")]
    Configuration {
        parameter: &'static str,
        reason: String,
    },

    /// A required OHLCV column is absent from a tabular input.
    #[error("missing required column `{column}`")]
    MissingColumn { column: &'static str },

    /// A bar carries a value that cannot be analysed.
    #[error("malformed bar at index {index}: {reason}")]
    MalformedBar { index: usize, reason: String },

    /// Timestamps must be strictly increasing (this also rejects duplicates).
    #[error("timestamp at index {index} is not after the previous bar")]
    NonMonotonicTimestamp { index: usize },
}

impl AnalysisError {
    pub fn configuration(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            parameter,
            reason: reason.into(),
        }
    }

    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedBar {
            index,
            reason: reason.into(),
        }
    }

    /// `true` for invalid parameter sets.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// `true` for every input-shape failure (columns, values, ordering).
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::MalformedBar { .. } | Self::NonMonotonicTimestamp { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
