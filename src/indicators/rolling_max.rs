// =============================================================================
// Trailing Maximum — monotonic-deque sliding window
// =============================================================================
//
// For every index i, the maximum of `values[i - period .. i]` (the `period`
// values strictly *before* i). The deque holds indices whose values are in
// decreasing order; each index is pushed and popped at most once, so the
// whole pass is O(n).
// =============================================================================

use std::collections::VecDeque;

/// Maximum of the `period` values preceding each index.
///
/// `None` for `i < period` (no full window) and for every index when
/// `period == 0`.
pub fn trailing_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 {
        return result;
    }

    let mut deque: VecDeque<usize> = VecDeque::with_capacity(period + 1);
    for i in 0..values.len() {
        // Window for slot i is [i - period, i): it is complete once i >= period.
        if i >= period {
            while deque.front().is_some_and(|&front| front < i - period) {
                deque.pop_front();
            }
            result[i] = deque.front().map(|&front| values[front]);
        }

        // Admit values[i] for the windows of later slots. Equal values are
        // dropped from the back; only the maximum's value is ever read.
        while deque.back().is_some_and(|&back| values[back] <= values[i]) {
            deque.pop_back();
        }
        deque.push_back(i);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(values: &[f64], period: usize) -> Vec<Option<f64>> {
        (0..values.len())
            .map(|i| {
                if period == 0 || i < period {
                    None
                } else {
                    values[i - period..i].iter().copied().reduce(f64::max)
                }
            })
            .collect()
    }

    #[test]
    fn empty_input() {
        assert!(trailing_max(&[], 3).is_empty());
    }

    #[test]
    fn excludes_current_value() {
        let values = [1.0, 2.0, 10.0];
        assert_eq!(trailing_max(&values, 2), vec![None, None, Some(2.0)]);
    }

    #[test]
    fn period_zero_is_all_none() {
        assert_eq!(trailing_max(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn ties_report_the_shared_maximum() {
        let values = [5.0, 5.0, 1.0, 5.0, 0.0, 0.0];
        assert_eq!(trailing_max(&values, 3), brute_force(&values, 3));
    }

    #[test]
    fn matches_brute_force_on_oscillating_series() {
        let values: Vec<f64> = (0..300)
            .map(|i| 50.0 + (i as f64 * 0.21).sin() * 10.0 + (i % 7) as f64)
            .collect();
        for period in [1, 2, 5, 20, 64, 299, 300, 400] {
            assert_eq!(trailing_max(&values, period), brute_force(&values, period), "period {period}");
        }
    }

    #[test]
    fn strictly_decreasing_keeps_oldest_in_window() {
        let values: Vec<f64> = (0..10).rev().map(f64::from).collect();
        let max = trailing_max(&values, 3);
        // Window [i-3, i) of a decreasing series peaks at i-3.
        for i in 3..10 {
            assert_eq!(max[i], Some(values[i - 3]));
        }
    }
}
