// =============================================================================
// Bulk Collector — download a universe into the local CSV store
// =============================================================================
//
// Sequential on purpose: the remote provider rate-limits aggressively, so the
// collector pauses `delay` between symbols. Failures and empty results are
// logged and counted; one bad symbol never aborts the run.
// =============================================================================

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{BarSource, CsvStore};
use crate::types::{DateRange, Interval};

/// Outcome of one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectSummary {
    pub saved: Vec<String>,
    pub empty: Vec<String>,
    pub failed: Vec<String>,
}

/// Fetch every symbol from `remote` and write it to `store`.
pub async fn collect_universe<R: BarSource>(
    remote: &R,
    store: &CsvStore,
    symbols: &[String],
    interval: Interval,
    range: DateRange,
    delay: Duration,
) -> CollectSummary {
    let mut summary = CollectSummary::default();
    info!(count = symbols.len(), %interval, "collecting bars");

    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        info!(symbol = %symbol, %interval, "collecting");
        match remote.fetch_bars(symbol, interval, range).await {
            Ok(series) if series.is_empty() => {
                warn!(symbol = %symbol, "no data available");
                summary.empty.push(symbol.clone());
            }
            Ok(series) => match store.save(symbol, interval, range, &series) {
                Ok(_) => summary.saved.push(symbol.clone()),
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "failed to save bars");
                    summary.failed.push(symbol.clone());
                }
            },
            Err(e) => {
                error!(symbol = %symbol, error = %e, "failed to collect bars");
                summary.failed.push(symbol.clone());
            }
        }
    }

    info!(
        saved = summary.saved.len(),
        empty = summary.empty.len(),
        failed = summary.failed.len(),
        "collection finished"
    );
    summary
}
