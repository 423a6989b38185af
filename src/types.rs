// =============================================================================
// Shared types used across the screener
// =============================================================================

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Bar interval understood by the chart provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "2m")]
    Minute2,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    #[serde(rename = "90m")]
    Minute90,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1wk")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
    #[serde(rename = "3mo")]
    Quarterly,
}

impl Default for Interval {
    fn default() -> Self {
        Self::Daily
    }
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Self::Minute1,
        Self::Minute2,
        Self::Minute5,
        Self::Minute15,
        Self::Minute30,
        Self::Minute60,
        Self::Minute90,
        Self::Hour1,
        Self::Daily,
        Self::Day5,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
    ];

    /// Provider query-string form (`1m`, `1d`, `1wk`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute2 => "2m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Minute60 => "60m",
            Self::Minute90 => "90m",
            Self::Hour1 => "1h",
            Self::Daily => "1d",
            Self::Day5 => "5d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
            Self::Quarterly => "3mo",
        }
    }

    /// How far back the provider serves history for this interval, in days.
    pub fn max_history_days(&self) -> i64 {
        match self {
            Self::Minute1 => 7,
            Self::Minute2
            | Self::Minute5
            | Self::Minute15
            | Self::Minute30
            | Self::Minute60
            | Self::Minute90 => 60,
            Self::Hour1 => 730,
            Self::Daily | Self::Day5 | Self::Weekly | Self::Monthly | Self::Quarterly => 10_000,
        }
    }

    /// Default look-back in days: one day short of the provider limit for
    /// intraday bars, five years for daily and longer.
    pub fn default_lookback_days(&self) -> i64 {
        match self {
            Self::Daily | Self::Day5 | Self::Weekly | Self::Monthly | Self::Quarterly => 365 * 5,
            _ => self.max_history_days() - 1,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|iv| iv.as_str() == wanted)
            .ok_or_else(|| AnalysisError::configuration("interval", format!("unknown interval '{wanted}'")))
    }
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// Half-open request window `[start, end)` for historical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The interval's default look-back ending at `now`.
    pub fn default_for(interval: Interval, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(interval.default_lookback_days()),
            end: now,
        }
    }

    /// Reject empty/inverted ranges and ranges the provider cannot serve.
    pub fn validate(&self, interval: Interval) -> Result<(), AnalysisError> {
        if self.start >= self.end {
            return Err(AnalysisError::configuration(
                "date_range",
                format!("start {} is not before end {}", self.start, self.end),
            ));
        }
        let max_days = interval.max_history_days();
        let days = (self.end - self.start).num_days();
        if days > max_days {
            return Err(AnalysisError::configuration(
                "date_range",
                format!("{interval} bars are limited to {max_days} days of history, requested {days}"),
            ));
        }
        Ok(())
    }
}
