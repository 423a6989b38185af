// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the trailing `period` closes, maintained as a running
// sum. Output is aligned with the input: `None` for the first `period - 1`
// slots.
// =============================================================================

/// Compute the SMA series for `closes` with look-back `period`.
///
/// Returns all `None` when `period == 0` or the input is shorter than
/// `period`.
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    let divisor = period as f64;
    let mut sum: f64 = closes[..period].iter().sum();
    result[period - 1] = Some(sum / divisor);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result[i] = Some(sum / divisor);
    }

    result
}
