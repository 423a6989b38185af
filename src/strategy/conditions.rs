// =============================================================================
// Pattern Conditions
// =============================================================================
//
//   1. Parallelism: |slope(EMA) - slope(MA_long)| < tolerance
//   2. Momentum   : every average's slope is strictly positive
//   3. Pullback   : today's open gaps below both the discounted previous
//                 close and the highest high of the preceding window
//
// Each condition is a pure per-bar function; a `None` operand is never true.
// =============================================================================

use crate::indicators::trailing_max;
use crate::market_data::PriceSeries;

/// Condition 1: EMA and long MA run parallel within `tolerance`.
pub fn parallel(ema_slope: &[Option<f64>], long_slope: &[Option<f64>], tolerance: f64) -> Vec<bool> {
    ema_slope
        .iter()
        .zip(long_slope)
        .map(|pair| match pair {
            (Some(e), Some(l)) => (e - l).abs() < tolerance,
            _ => false,
        })
        .collect()
}

/// Condition 2: all supplied slopes are defined and strictly positive.
///
/// `slopes` holds one aligned series per average; `len` is the bar count.
pub fn positive_momentum(slopes: &[&[Option<f64>]], len: usize) -> Vec<bool> {
    (0..len)
        .map(|i| {
            slopes
                .iter()
                .all(|series| series.get(i).copied().flatten().is_some_and(|s| s > 0.0))
        })
        .collect()
}

/// Condition 3: pullback breakout against the preceding `period` bars.
///
/// For `i >= period`, with `window = [i - period, i)`:
/// `open[i] < close[i-1] * (1 - threshold)` and `open[i] < max(high[window])`.
pub fn pullback_breakout(series: &PriceSeries, period: usize, threshold: f64) -> Vec<bool> {
    let opens = series.opens();
    let closes = series.closes();
    let previous_highs = trailing_max(&series.highs(), period);

    opens
        .iter()
        .enumerate()
        .map(|(i, &open)| {
            let Some(previous_high) = previous_highs[i] else {
                return false;
            };
            let breakout1 = open < closes[i - 1] * (1.0 - threshold);
            let breakout2 = open < previous_high;
            breakout1 && breakout2
        })
        .collect()
}
