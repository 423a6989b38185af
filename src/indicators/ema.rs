// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value (index `period - 1`) is seeded with the SMA of the
// first `period` closes. The output is aligned with the input: one slot per
// close, `None` before the seed.
// =============================================================================

/// Compute the EMA series for `closes` with look-back `period`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() < period` => all `None`
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let seed = closes[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(seed);

    let mut prev_ema = seed;
    for (i, &close) in closes.iter().enumerate().skip(period) {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        result[i] = Some(ema);
        prev_ema = ema;
    }

    result
}
