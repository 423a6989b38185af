// =============================================================================
// Signal Engine — parallel averages + positive momentum + pullback breakout
// =============================================================================
//
// Pipeline (pure, synchronous, one call per (series, params) pair):
//   1. Validate parameters (configuration errors fail fast)
//   2. Compute EMA(ema_period), MA(ma_long_period), MA(p) for each mid period
//   3. Difference every average into a slope column
//   4. Evaluate the three conditions per bar
//   5. AND them into the signal series and assemble the augmented output
//
// No rows are dropped or reordered; every column is aligned with the input.
// =============================================================================

pub mod conditions;
pub mod params;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::indicators::{calculate_ema, calculate_slope, calculate_sma};
use crate::market_data::{Bar, PriceSeries};

pub use params::{AnalysisParams, MID_AVERAGE_COUNT};

// =============================================================================
// Output types
// =============================================================================

/// One derived column (`EMA120`, `MA25_slope`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// The input bars plus every derived indicator and slope column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentedSeries {
    pub bars: Vec<Bar>,
    pub columns: Vec<IndicatorColumn>,
}

impl AugmentedSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Look up a derived column by its deterministic name.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn push_unique(&mut self, name: String, values: Vec<Option<f64>>) {
        if self.column(&name).is_none() {
            self.columns.push(IndicatorColumn { name, values });
        }
    }
}

/// The three per-bar conditions that feed the signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionSeries {
    pub parallel: Vec<bool>,
    pub momentum: Vec<bool>,
    pub pullback: Vec<bool>,
}

/// Non-fatal note: the series is shorter than the longest look-back, so most
/// derived values are `None` and the signal series is all-false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsufficientData {
    pub required: usize,
    pub actual: usize,
}

/// Full result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalAnalysis {
    pub series: AugmentedSeries,
    pub conditions: ConditionSeries,
    pub signals: Vec<bool>,
    pub insufficient_data: Option<InsufficientData>,
}

impl SignalAnalysis {
    pub fn signal_count(&self) -> usize {
        self.signals.iter().filter(|&&s| s).count()
    }

    pub fn signal_timestamps(&self) -> Vec<DateTime<Utc>> {
        self.series
            .bars
            .iter()
            .zip(&self.signals)
            .filter(|(_, &s)| s)
            .map(|(b, _)| b.timestamp)
            .collect()
    }

    /// Signal dates formatted as `YYYY-MM-DD`.
    pub fn signal_dates(&self) -> Vec<String> {
        self.signal_timestamps()
            .iter()
            .map(|t| t.format("%Y-%m-%d").to_string())
            .collect()
    }

    pub fn last_signal(&self) -> Option<DateTime<Utc>> {
        self.signal_timestamps().last().copied()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Run the pattern over `series`.
///
/// Returns a configuration error for an invalid `params`; any valid input,
/// including an empty or short series, yields a fully-formed analysis.
pub fn analyze(series: &PriceSeries, params: &AnalysisParams) -> Result<SignalAnalysis> {
    params.validate()?;

    let len = series.len();
    let closes = series.closes();
    let timestamps = series.timestamps();
    let basis = params.slope_basis;

    // ── 1. Moving averages ───────────────────────────────────────────────
    let ema = calculate_ema(&closes, params.ema_period);
    let ma_long = calculate_sma(&closes, params.ma_long_period);
    let ma_mids: Vec<Vec<Option<f64>>> = params
        .ma_mid_periods
        .iter()
        .map(|&p| calculate_sma(&closes, p))
        .collect();

    // ── 2. Slopes ────────────────────────────────────────────────────────
    let ema_slope = calculate_slope(&ema, &timestamps, basis);
    let ma_long_slope = calculate_slope(&ma_long, &timestamps, basis);
    let ma_mid_slopes: Vec<Vec<Option<f64>>> = ma_mids
        .iter()
        .map(|avg| calculate_slope(avg, &timestamps, basis))
        .collect();

    // ── 3. Conditions ────────────────────────────────────────────────────
    let parallel = conditions::parallel(&ema_slope, &ma_long_slope, params.tolerance);

    let mut momentum_inputs: Vec<&[Option<f64>]> = vec![&ema_slope, &ma_long_slope];
    momentum_inputs.extend(ma_mid_slopes.iter().map(Vec::as_slice));
    let momentum = conditions::positive_momentum(&momentum_inputs, len);

    let pullback =
        conditions::pullback_breakout(series, params.compression_period, params.compression_threshold);

    // ── 4. Conjunction ───────────────────────────────────────────────────
    let signals: Vec<bool> = (0..len)
        .map(|i| parallel[i] && momentum[i] && pullback[i])
        .collect();

    // ── 5. Output assembly ───────────────────────────────────────────────
    let mut augmented = AugmentedSeries {
        bars: series.bars().to_vec(),
        columns: Vec::with_capacity(2 * (2 + MID_AVERAGE_COUNT)),
    };
    let ema_name = params.ema_column();
    let long_name = params.ma_long_column();
    let mid_names = params.ma_mid_columns();

    augmented.push_unique(ema_name.clone(), ema);
    augmented.push_unique(long_name.clone(), ma_long);
    for (name, avg) in mid_names.iter().zip(ma_mids) {
        augmented.push_unique(name.clone(), avg);
    }
    augmented.push_unique(format!("{ema_name}_slope"), ema_slope);
    augmented.push_unique(format!("{long_name}_slope"), ma_long_slope);
    for (name, slope) in mid_names.iter().zip(ma_mid_slopes) {
        augmented.push_unique(format!("{name}_slope"), slope);
    }

    let required = params.required_bars();
    let insufficient_data = (len < required).then(|| {
        warn!(
            required,
            actual = len,
            "series shorter than the longest look-back; signals will be all false"
        );
        InsufficientData { required, actual: len }
    });

    let analysis = SignalAnalysis {
        series: augmented,
        conditions: ConditionSeries {
            parallel,
            momentum,
            pullback,
        },
        signals,
        insufficient_data,
    };

    debug!(
        bars = len,
        signals = analysis.signal_count(),
        params = %params.fingerprint(),
        "pullback analysis complete"
    );

    Ok(analysis)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::SlopeBasis;
    use chrono::{Duration, TimeZone};

    const DAY: f64 = 86_400.0;

    /// 300 daily bars: close = 100 + i, high/low = close ± 0.5, open = previous
    /// close (first open = first close).
    fn uptrend(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                let open = if i == 0 { close } else { close - 1.0 };
                Bar::new(start + Duration::days(i as i64), open, close + 0.5, close - 0.5, close, 1_000.0)
            })
            .collect()
    }

    fn scenario_params() -> AnalysisParams {
        AnalysisParams {
            tolerance: 1e-6,
            compression_period: 20,
            compression_threshold: 0.05,
            ema_period: 120,
            ma_long_period: 111,
            ma_mid_periods: vec![25, 33, 49],
            slope_basis: SlopeBasis::WallClock,
        }
    }

    fn pullback_series() -> PriceSeries {
        let mut bars = uptrend(300);
        bars[250].open = bars[249].close * 0.8;
        PriceSeries::new(bars).unwrap()
    }

    #[test]
    fn uptrend_has_momentum_but_no_signal() {
        let series = PriceSeries::new(uptrend(300)).unwrap();
        let params = scenario_params();
        let analysis = analyze(&series, &params).unwrap();

        // EMA120 is the last average to be defined (index 119); its slope
        // exists from index 120.
        for i in 120..300 {
            assert!(analysis.conditions.momentum[i], "momentum false at {i}");
            let slope = analysis.series.column("EMA120_slope").unwrap()[i].unwrap();
            assert!((slope - 1.0 / DAY).abs() < 1e-9);
        }
        assert!(analysis.conditions.pullback.iter().all(|&c| !c));
        assert_eq!(analysis.signal_count(), 0);
        assert!(analysis.insufficient_data.is_none());
    }

    #[test]
    fn engineered_pullback_fires_on_bar_250() {
        let series = pullback_series();
        let analysis = analyze(&series, &scenario_params()).unwrap();

        assert!(analysis.conditions.pullback[250]);
        assert!(analysis.conditions.parallel[250]);
        assert!(analysis.conditions.momentum[250]);
        assert!(analysis.signals[250]);
        assert_eq!(analysis.signal_count(), 1);
        assert_eq!(analysis.signal_dates(), vec!["2023-09-08".to_string()]);
        assert_eq!(analysis.last_signal(), Some(series.bars()[250].timestamp));
    }

    #[test]
    fn output_is_deterministic() {
        let series = pullback_series();
        let params = scenario_params();
        let a = analyze(&series, &params).unwrap();
        let b = analyze(&series, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn truncation_reproduces_earlier_signals() {
        let series = pullback_series();
        let params = scenario_params();
        let full = analyze(&series, &params).unwrap();

        for k in [1, 21, 120, 251, 260, 299] {
            let partial = analyze(&series.truncated(k), &params).unwrap();
            assert_eq!(partial.signals[..], full.signals[..k], "k = {k}");
            assert_eq!(partial.conditions.pullback[..], full.conditions.pullback[..k], "k = {k}");
        }
    }

    #[test]
    fn warm_up_bars_are_null_and_false() {
        let series = PriceSeries::new(uptrend(300)).unwrap();
        let analysis = analyze(&series, &scenario_params()).unwrap();

        for (name, window) in [("EMA120", 120), ("MA111", 111), ("MA25", 25), ("MA33", 33), ("MA49", 49)] {
            let avg = analysis.series.column(name).unwrap();
            let slope = analysis.series.column(&format!("{name}_slope")).unwrap();
            for i in 0..window - 1 {
                assert!(avg[i].is_none(), "{name}[{i}]");
                assert!(slope[i].is_none(), "{name}_slope[{i}]");
                assert!(!analysis.conditions.parallel[i]);
                assert!(!analysis.conditions.momentum[i]);
            }
            assert!(avg[window - 1].is_some());
            assert!(slope[window - 1].is_none(), "slope needs the previous average");
            assert!(slope[window].is_some());
        }
    }

    #[test]
    fn pullback_never_fires_before_a_full_window() {
        // Every bar gaps far below the previous close.
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..40)
            .map(|i| Bar::new(start + Duration::days(i), 50.0, 120.0, 40.0, 100.0, 1.0))
            .collect();
        let series = PriceSeries::new(bars).unwrap();
        let params = AnalysisParams { compression_period: 20, ..scenario_params() };
        let analysis = analyze(&series, &params).unwrap();

        assert!(analysis.conditions.pullback[..20].iter().all(|&c| !c));
        assert!(analysis.conditions.pullback[20..].iter().all(|&c| c));
    }

    #[test]
    fn signal_is_the_conjunction_of_conditions() {
        let series = pullback_series();
        let params = AnalysisParams { tolerance: 1.0, ..scenario_params() };
        let analysis = analyze(&series, &params).unwrap();
        let c = &analysis.conditions;
        for i in 0..series.len() {
            assert_eq!(analysis.signals[i], c.parallel[i] && c.momentum[i] && c.pullback[i], "bar {i}");
        }
    }

    #[test]
    fn series_of_exactly_one_window_is_all_false() {
        let series = PriceSeries::new(uptrend(20)).unwrap();
        let analysis = analyze(&series, &scenario_params()).unwrap();
        assert_eq!(analysis.signals, vec![false; 20]);
        assert_eq!(
            analysis.insufficient_data,
            Some(InsufficientData { required: 121, actual: 20 })
        );
    }

    #[test]
    fn empty_series_yields_empty_outputs() {
        let analysis = analyze(&PriceSeries::empty(), &scenario_params()).unwrap();
        assert!(analysis.signals.is_empty());
        assert!(analysis.series.is_empty());
        assert!(analysis.series.columns.iter().all(|c| c.values.is_empty()));
        assert_eq!(analysis.signal_count(), 0);
    }

    #[test]
    fn invalid_params_fail_before_computation() {
        let series = PriceSeries::new(uptrend(10)).unwrap();
        let params = AnalysisParams { ma_mid_periods: vec![], ..scenario_params() };
        let err = analyze(&series, &params).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn columns_are_named_and_aligned() {
        let series = PriceSeries::new(uptrend(150)).unwrap();
        let analysis = analyze(&series, &scenario_params()).unwrap();
        assert_eq!(
            analysis.series.column_names(),
            vec![
                "EMA120", "MA111", "MA25", "MA33", "MA49",
                "EMA120_slope", "MA111_slope", "MA25_slope", "MA33_slope", "MA49_slope",
            ]
        );
        for col in &analysis.series.columns {
            assert_eq!(col.values.len(), 150, "{}", col.name);
        }
        assert_eq!(analysis.series.bars, series.bars());
    }

    #[test]
    fn shared_period_produces_a_single_column() {
        let series = PriceSeries::new(uptrend(60)).unwrap();
        let params = AnalysisParams {
            ema_period: 10,
            ma_long_period: 25,
            ..scenario_params()
        };
        let analysis = analyze(&series, &params).unwrap();
        let names = analysis.series.column_names();
        assert_eq!(names.iter().filter(|n| **n == "MA25").count(), 1);
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn weekend_gap_changes_wall_clock_slope_only() {
        // Skip two calendar days before bar 130: the close step is still 1.0,
        // so the wall-clock slope drops to a third while the per-bar slope
        // stays at 1.0.
        let mut bars = uptrend(160);
        for bar in bars.iter_mut().skip(130) {
            bar.timestamp = bar.timestamp + Duration::days(2);
        }
        let series = PriceSeries::new(bars).unwrap();

        let wall = analyze(&series, &scenario_params()).unwrap();
        let per_bar = analyze(
            &series,
            &AnalysisParams { slope_basis: SlopeBasis::PerBar, ..scenario_params() },
        )
        .unwrap();

        let wall_slope = wall.series.column("MA25_slope").unwrap()[130].unwrap();
        let bar_slope = per_bar.series.column("MA25_slope").unwrap()[130].unwrap();
        assert!((wall_slope - 1.0 / (3.0 * DAY)).abs() < 1e-12);
        assert!((bar_slope - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sub_millisecond_bars_keep_slopes_finite() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        let bars: Vec<Bar> = (0..6)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::new(start + Duration::microseconds(500 * i), close, close + 0.5, close - 0.5, close, 10.0)
            })
            .collect();
        let series = PriceSeries::new(bars).unwrap();
        let params = AnalysisParams {
            compression_period: 2,
            ema_period: 2,
            ma_long_period: 2,
            ma_mid_periods: vec![2, 2, 2],
            ..scenario_params()
        };
        let analysis = analyze(&series, &params).unwrap();

        for column in &analysis.series.columns {
            for value in column.values.iter().flatten() {
                assert!(value.is_finite(), "{} has {value}", column.name);
            }
        }
        let ma_slope = analysis.series.column("MA2_slope").unwrap();
        assert_eq!(ma_slope[..2], [None, None]);
        assert!((ma_slope[2].unwrap() - 2_000.0).abs() < 1e-6);
        assert_eq!(analysis.conditions.momentum, vec![false, false, true, true, true, true]);
    }
}
