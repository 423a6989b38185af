// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free moving-average and window kernels used by the signal
// engine. Every function returns a series aligned with its input, with `None`
// wherever the value is undefined (warm-up or missing operand).

pub mod ema;
pub mod rolling_max;
pub mod slope;
pub mod sma;

pub use ema::calculate_ema;
pub use rolling_max::trailing_max;
pub use slope::{calculate_slope, seconds_between, SlopeBasis};
pub use sma::calculate_sma;
