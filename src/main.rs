// =============================================================================
// Pullback Screener — Main Entry Point
// =============================================================================
//
//   pullback-screener            serve the REST API and re-screen periodically
//   pullback-screener collect    download the universe into the CSV store
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pullback_screener::api;
use pullback_screener::app_state::AppState;
use pullback_screener::market_data::collector::collect_universe;
use pullback_screener::market_data::{CsvStore, LocalFirstSource, YahooClient};
use pullback_screener::runtime_config::RuntimeConfig;
use pullback_screener::types::DateRange;

const CONFIG_PATH: &str = "screener_config.json";
const MIN_REFRESH_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = RuntimeConfig::load_or_default(CONFIG_PATH)?;

    if let Ok(syms) = std::env::var("SCREENER_SYMBOLS") {
        config.apply_symbol_override(&syms);
    }

    info!(
        instruments = config.universe.len(),
        interval = %config.interval,
        params = %config.params.fingerprint(),
        "Configured universe"
    );

    // ── 2. Sub-commands ──────────────────────────────────────────────────
    if std::env::args().nth(1).as_deref() == Some("collect") {
        return run_collect(&config).await;
    }

    // ── 3. Build shared state ────────────────────────────────────────────
    let source = LocalFirstSource::new(CsvStore::new(config.data_dir.clone()), YahooClient::new()?);
    let refresh_secs = config.refresh_interval_secs.max(MIN_REFRESH_SECS);
    let state = Arc::new(AppState::new(config, CONFIG_PATH, source));

    // ── 4. Background re-screen ──────────────────────────────────────────
    let screen_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs));
        loop {
            interval.tick().await;
            // Bars move on; results from the previous cycle are stale.
            screen_state.cache.clear();
            let snapshot = screen_state.refresh().await;
            info!(
                instruments = snapshot.entries.len(),
                with_signals = snapshot.entries.iter().filter(|e| e.signal_count > 0).count(),
                "Background screen complete"
            );
        }
    });

    // ── 5. Start the API server ──────────────────────────────────────────
    let bind_addr = std::env::var("SCREENER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("Screener running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");

    let config = state.config.read().clone();
    if let Err(e) = config.save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Pullback screener shut down complete.");
    Ok(())
}

/// Download every configured instrument into the local store and exit.
async fn run_collect(config: &RuntimeConfig) -> anyhow::Result<()> {
    let client = YahooClient::new()?;
    let store = CsvStore::new(config.data_dir.clone());
    let range = DateRange::default_for(config.interval, Utc::now());

    let summary = collect_universe(
        &client,
        &store,
        &config.symbols(),
        config.interval,
        range,
        Duration::from_millis(config.fetch_delay_ms),
    )
    .await;

    info!(
        saved = summary.saved.len(),
        empty = ?summary.empty,
        failed = ?summary.failed,
        dir = %store.root().display(),
        "Collection complete"
    );
    Ok(())
}
