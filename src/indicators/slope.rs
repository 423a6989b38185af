// =============================================================================
// Slope — first difference of an aligned indicator series
// =============================================================================
//
//   slope_i = (avg_i - avg_{i-1}) / dt_i
//
// Under `SlopeBasis::WallClock` dt_i is the elapsed time between bar i-1 and
// bar i in (fractional) seconds, so calendar gaps such as weekends shrink the
// slope. Under `SlopeBasis::PerBar` dt_i is always 1.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Denominator used when differencing an average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeBasis {
    /// Divide by the elapsed seconds between consecutive bars.
    #[default]
    WallClock,
    /// Divide by one bar, ignoring spacing.
    PerBar,
}

impl std::fmt::Display for SlopeBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WallClock => write!(f, "wall_clock"),
            Self::PerBar => write!(f, "per_bar"),
        }
    }
}

/// Elapsed seconds from `from` to `to`, with nanosecond resolution
/// (microseconds for gaps too long to count in nanoseconds).
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let gap = to - from;
    match gap.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => gap.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6,
    }
}

/// Per-bar slope of `values`, aligned with the input.
///
/// Index 0 and every index where either operand is `None` yield `None`.
/// `values` and `timestamps` must have the same length.
pub fn calculate_slope(
    values: &[Option<f64>],
    timestamps: &[DateTime<Utc>],
    basis: SlopeBasis,
) -> Vec<Option<f64>> {
    debug_assert_eq!(values.len(), timestamps.len());

    let mut result = vec![None; values.len()];
    for i in 1..values.len() {
        let (Some(prev), Some(curr)) = (values[i - 1], values[i]) else {
            continue;
        };
        let dt = match basis {
            SlopeBasis::WallClock => seconds_between(timestamps[i - 1], timestamps[i]),
            SlopeBasis::PerBar => 1.0,
        };
        result[i] = Some((curr - prev) / dt);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn daily(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn first_bar_is_always_none() {
        let slope = calculate_slope(&[Some(1.0), Some(2.0)], &daily(2), SlopeBasis::WallClock);
        assert_eq!(slope[0], None);
        assert!(slope[1].is_some());
    }

    #[test]
    fn none_operand_propagates() {
        let values = [None, Some(2.0), None, Some(4.0), Some(5.0)];
        let slope = calculate_slope(&values, &daily(5), SlopeBasis::PerBar);
        assert_eq!(slope, vec![None, None, None, None, Some(1.0)]);
    }

    #[test]
    fn wall_clock_divides_by_seconds() {
        let values = [Some(10.0), Some(11.0)];
        let slope = calculate_slope(&values, &daily(2), SlopeBasis::WallClock);
        assert!((slope[1].unwrap() - 1.0 / 86_400.0).abs() < 1e-18);
    }

    #[test]
    fn wall_clock_sees_calendar_gaps() {
        // Friday -> Monday is three days; the same price step yields a third
        // of the slope under wall-clock timing but not per bar.
        let fri = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let mon = fri + Duration::days(3);
        let values = [Some(100.0), Some(103.0)];

        let wall = calculate_slope(&values, &[fri, mon], SlopeBasis::WallClock);
        let per_bar = calculate_slope(&values, &[fri, mon], SlopeBasis::PerBar);

        assert!((wall[1].unwrap() - 1.0 / 86_400.0).abs() < 1e-15);
        assert!((per_bar[1].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn seconds_between_keeps_fractions() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::milliseconds(1_500);
        assert!((seconds_between(t0, t1) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn sub_millisecond_spacing_gives_finite_slopes() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stamps: Vec<DateTime<Utc>> = (0..4).map(|i| t0 + Duration::microseconds(500 * i)).collect();
        assert!((seconds_between(stamps[0], stamps[1]) - 0.0005).abs() < 1e-15);

        let values = [None, Some(1.0), Some(2.0), Some(4.0)];
        let slope = calculate_slope(&values, &stamps, SlopeBasis::WallClock);
        assert_eq!(slope[1], None);
        assert!((slope[2].unwrap() - 2_000.0).abs() < 1e-6);
        assert!((slope[3].unwrap() - 4_000.0).abs() < 1e-6);
    }

    #[test]
    fn very_long_gaps_fall_back_to_microseconds() {
        let t0 = Utc.with_ymd_and_hms(1800, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2200, 1, 1, 0, 0, 0).unwrap();
        let expected = (t1 - t0).num_seconds() as f64;
        assert!(((seconds_between(t0, t1) - expected) / expected).abs() < 1e-12);
    }

    #[test]
    fn basis_serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&SlopeBasis::PerBar).unwrap(), "\"per_bar\"");
        let basis: SlopeBasis = serde_json::from_str("\"wall_clock\"").unwrap();
        assert_eq!(basis, SlopeBasis::WallClock);
    }
}
