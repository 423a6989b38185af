// =============================================================================
// CSV Store — local file cache of downloaded bars
// =============================================================================
//
// Layout: `{root}/{SYMBOL}_{interval}_{YYYYMMDD}_{YYYYMMDD}.csv`
//
// Reading is lenient about *shape* (case-insensitive headers, extra columns
// such as "Dividends" or "Stock Splits" are ignored, several timestamp
// spellings) but strict about *content*: a missing OHLCV column, an
// unparseable number or an out-of-order timestamp is an error, never a
// silently dropped row.
// =============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Writer};
use tracing::{debug, info};

use super::{Bar, BarSource, PriceSeries};
use crate::error::AnalysisError;
use crate::types::{DateRange, Interval};

const TIMESTAMP_HEADERS: &[&str] = &["date", "datetime", "timestamp", "time"];

/// Directory-backed store of per-instrument CSV files.
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds `symbol` bars for `interval` over `range`.
    pub fn path_for(&self, symbol: &str, interval: Interval, range: DateRange) -> PathBuf {
        self.root.join(format!(
            "{}_{}_{}_{}.csv",
            symbol.to_uppercase(),
            interval.as_str(),
            range.start.format("%Y%m%d"),
            range.end.format("%Y%m%d"),
        ))
    }

    /// Load a stored series; `Ok(None)` when no file exists.
    pub fn load(&self, symbol: &str, interval: Interval, range: DateRange) -> Result<Option<PriceSeries>> {
        let path = self.path_for(symbol, interval, range);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let series = read_series(file).with_context(|| format!("failed to read bars from {}", path.display()))?;
        debug!(path = %path.display(), bars = series.len(), "loaded bars from local store");
        Ok(Some(series))
    }

    /// Write `series`, creating the store directory if needed.
    pub fn save(&self, symbol: &str, interval: Interval, range: DateRange, series: &PriceSeries) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create data directory {}", self.root.display()))?;

        let path = self.path_for(symbol, interval, range);
        let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        write_series(file, series).with_context(|| format!("failed to write bars to {}", path.display()))?;

        info!(path = %path.display(), bars = series.len(), "bars saved");
        Ok(path)
    }
}

impl BarSource for CsvStore {
    async fn fetch_bars(&self, symbol: &str, interval: Interval, range: DateRange) -> Result<PriceSeries> {
        self.load(symbol, interval, range)?.with_context(|| {
            format!(
                "no local data for {symbol} ({interval}) at {}",
                self.path_for(symbol, interval, range).display()
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

fn parse_number(raw: &str, column: &str, index: usize) -> std::result::Result<f64, AnalysisError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AnalysisError::malformed(index, format!("{column} value '{}' is not numeric", raw.trim())))
}

/// Parse OHLCV rows from any CSV reader into a validated series.
pub fn read_series<R: Read>(reader: R) -> Result<PriceSeries> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let columns: HashMap<String, usize> = rdr
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();

    let ts_col = TIMESTAMP_HEADERS
        .iter()
        .find_map(|h| columns.get(*h).copied())
        .ok_or(AnalysisError::MissingColumn { column: "date" })?;
    let field = |name: &'static str| {
        columns
            .get(name)
            .copied()
            .ok_or(AnalysisError::MissingColumn { column: name })
    };
    let (open_col, high_col, low_col, close_col, volume_col) =
        (field("open")?, field("high")?, field("low")?, field("close")?, field("volume")?);

    let mut bars = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV row {index}"))?;
        let cell = |col: usize| record.get(col).unwrap_or("");

        let raw_ts = cell(ts_col);
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| AnalysisError::malformed(index, format!("unrecognised timestamp '{raw_ts}'")))?;

        bars.push(Bar::new(
            timestamp,
            parse_number(cell(open_col), "open", index)?,
            parse_number(cell(high_col), "high", index)?,
            parse_number(cell(low_col), "low", index)?,
            parse_number(cell(close_col), "close", index)?,
            parse_number(cell(volume_col), "volume", index)?,
        ));
    }

    Ok(PriceSeries::new(bars)?)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `series` with the canonical header and RFC 3339 timestamps.
pub fn write_series<W: Write>(writer: W, series: &PriceSeries) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["date", "open", "high", "low", "close", "volume"])?;
    for bar in series.bars() {
        wtr.write_record([
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
