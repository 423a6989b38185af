// =============================================================================
// Yahoo Chart API Client — historical OHLCV bars
// =============================================================================
//
// GET {base}/{symbol}?period1=<unix>&period2=<unix>&interval=<1d|1h|...>
//
// The chart payload is column-oriented: one `timestamp` array plus parallel
// `open/high/low/close/volume` arrays that contain nulls for halted or
// not-yet-printed sessions. Rows with any null are skipped here, at the data
// boundary; the engine itself never drops rows.
// =============================================================================

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Bar, BarSource, PriceSeries};
use crate::types::{DateRange, Interval};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// -----------------------------------------------------------------------------
// Response shapes
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// HTTP client for the Yahoo chart endpoint.
#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different chart endpoint (mirrors, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, "YahooClient initialised");
        Ok(Self { base_url, client })
    }

    fn chart_url(&self, symbol: &str, interval: Interval, range: DateRange) -> String {
        format!(
            "{}/{}?period1={}&period2={}&interval={}",
            self.base_url,
            symbol,
            range.start.timestamp(),
            range.end.timestamp(),
            interval.as_str()
        )
    }

    /// GET the chart for `symbol` and parse it into a validated series.
    #[instrument(skip(self), name = "yahoo::get_chart")]
    pub async fn get_chart(&self, symbol: &str, interval: Interval, range: DateRange) -> Result<PriceSeries> {
        range.validate(interval)?;
        let url = self.chart_url(symbol, interval, range);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET chart for {symbol} failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read chart body for {symbol}"))?;

        if !status.is_success() {
            bail!("chart request for {symbol} returned {status}: {body}");
        }

        let series = parse_chart(&body).with_context(|| format!("invalid chart payload for {symbol}"))?;
        debug!(symbol, %interval, bars = series.len(), "chart fetched");
        Ok(series)
    }
}

impl BarSource for YahooClient {
    async fn fetch_bars(&self, symbol: &str, interval: Interval, range: DateRange) -> Result<PriceSeries> {
        self.get_chart(symbol, interval, range).await
    }
}

/// Parse a chart JSON body. Rows with any null field are skipped; an empty
/// result is an error.
pub fn parse_chart(body: &str) -> Result<PriceSeries> {
    let response: ChartResponse = serde_json::from_str(body).context("failed to parse chart JSON")?;

    if let Some(err) = response.chart.error {
        bail!("provider error [{}]: {}", err.code, err.description);
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .context("chart response has no result")?;
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(data.timestamp.len());
    let mut skipped = 0usize;
    for (i, &ts) in data.timestamp.iter().enumerate() {
        let at = |col: &[Option<f64>]| col.get(i).copied().flatten();
        let row = (
            Utc.timestamp_opt(ts, 0).single(),
            at(&quote.open),
            at(&quote.high),
            at(&quote.low),
            at(&quote.close),
            at(&quote.volume),
        );
        match row {
            (Some(t), Some(o), Some(h), Some(l), Some(c), Some(v)) => bars.push(Bar::new(t, o, h, l, c, v)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "chart rows with missing fields skipped");
    }
    if bars.is_empty() {
        bail!("chart response contains no complete bars");
    }

    Ok(PriceSeries::new(bars)?)
}
