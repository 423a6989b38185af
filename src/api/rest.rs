// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//
//   GET  /health                 service status + recent errors
//   GET  /settings               current pattern parameters and interval
//   PUT  /settings               replace them (invalid params -> 400)
//   GET  /screen                 ranked universe (?only_signals, ?refresh)
//   GET  /analysis/:symbol       full augmented series for one instrument
//   POST /cache/invalidate       drop one symbol's results, or all
//
// CORS is configured permissively for development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::{AppState, ScreenSnapshot, Settings};
use crate::error::AnalysisError;
use crate::market_data::BarSource;
use crate::screener::{only_with_signals, ScreenEntry};
use crate::strategy::{AugmentedSeries, ConditionSeries, InsufficientData};
use crate::types::Interval;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router<S: BarSource + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health::<S>))
        .route("/api/v1/settings", get(get_settings::<S>).put(put_settings::<S>))
        .route("/api/v1/screen", get(screen::<S>))
        .route("/api/v1/analysis/:symbol", get(analysis::<S>))
        .route("/api/v1/cache/invalidate", post(invalidate_cache::<S>))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn health<S: BarSource>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    Json(state.build_health())
}

// =============================================================================
// Settings
// =============================================================================

async fn get_settings<S: BarSource>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    Json(state.settings())
}

async fn put_settings<S: BarSource>(
    State(state): State<Arc<AppState<S>>>,
    Json(settings): Json<Settings>,
) -> Result<impl IntoResponse, ApiError> {
    match state.update_settings(settings) {
        Ok(applied) => Ok(Json(applied)),
        Err(e) => {
            warn!(error = %e, "rejected settings update");
            Err(api_error(StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

// =============================================================================
// Screen
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ScreenQuery {
    #[serde(default)]
    only_signals: bool,
    /// Force a re-screen even when the last snapshot matches the settings.
    #[serde(default)]
    refresh: bool,
}

#[derive(Serialize)]
struct ScreenResponse {
    generated_at: chrono::DateTime<chrono::Utc>,
    interval: Interval,
    params_fingerprint: String,
    total: usize,
    entries: Vec<ScreenEntry>,
}

async fn screen<S: BarSource>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ScreenQuery>,
) -> impl IntoResponse {
    let settings = state.settings();
    let fresh: Option<ScreenSnapshot> = state
        .last_screen
        .read()
        .as_ref()
        .filter(|s| s.interval == settings.interval && s.params_fingerprint == settings.params.fingerprint())
        .cloned();

    let snapshot = match fresh {
        Some(s) if !query.refresh => s,
        _ => state.refresh().await,
    };

    let total = snapshot.entries.len();
    let entries = if query.only_signals {
        only_with_signals(&snapshot.entries)
    } else {
        snapshot.entries
    };

    Json(ScreenResponse {
        generated_at: snapshot.generated_at,
        interval: snapshot.interval,
        params_fingerprint: snapshot.params_fingerprint,
        total,
        entries,
    })
}

// =============================================================================
// Single-instrument analysis
// =============================================================================

#[derive(Serialize)]
struct AnalysisResponse {
    symbol: String,
    interval: Interval,
    params: crate::strategy::AnalysisParams,
    signal_count: usize,
    signal_dates: Vec<String>,
    signals: Vec<bool>,
    conditions: ConditionSeries,
    insufficient_data: Option<InsufficientData>,
    series: AugmentedSeries,
}

async fn analysis<S: BarSource>(
    State(state): State<Arc<AppState<S>>>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = symbol.to_uppercase();
    let (settings, analysis) = state.analyze_symbol(&symbol).await.map_err(|e| {
        warn!(symbol = %symbol, error = %e, "analysis failed");
        let status = if e.downcast_ref::<AnalysisError>().is_some() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::BAD_GATEWAY
        };
        api_error(status, format!("{e:#}"))
    })?;

    Ok(Json(AnalysisResponse {
        symbol,
        interval: settings.interval,
        params: settings.params,
        signal_count: analysis.signal_count(),
        signal_dates: analysis.signal_dates(),
        signals: analysis.signals,
        conditions: analysis.conditions,
        insufficient_data: analysis.insufficient_data,
        series: analysis.series,
    }))
}

// =============================================================================
// Cache control
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct InvalidateRequest {
    #[serde(default)]
    symbol: Option<String>,
}

async fn invalidate_cache<S: BarSource>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<InvalidateRequest>,
) -> impl IntoResponse {
    let removed = state.invalidate(req.symbol.as_deref());
    info!(symbol = ?req.symbol, removed, "cache invalidated via API");
    Json(serde_json::json!({ "removed": removed }))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::test_support::{uptrend_with_pullbacks, StaticSource};
    use crate::runtime_config::RuntimeConfig;
    use crate::screener::Instrument;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> (Arc<AppState<StaticSource>>, Router) {
        let mut config = RuntimeConfig::default();
        config.universe = vec![
            Instrument::new("AAPL", "Apple Inc."),
            Instrument::new("MSFT", "Microsoft"),
        ];
        let source = StaticSource::default()
            .with("AAPL", uptrend_with_pullbacks(300, &[250]))
            .with("MSFT", uptrend_with_pullbacks(300, &[]));
        let state = Arc::new(AppState::new(config, dir.join("screener_config.json"), source));
        (state.clone(), router(state))
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (_, app) = app(dir.path());
        let (status, body) = call(app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["instruments"], 2);
    }

    #[tokio::test]
    async fn settings_round_trip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(dir.path());

        let (status, body) = call(app.clone(), Method::GET, "/api/v1/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interval"], "1d");
        assert_eq!(body["params"]["ema_period"], 120);

        let bad = r#"{ "params": { "ma_mid_periods": [25, 33] }, "interval": "1d" }"#;
        let (status, body) = call(app.clone(), Method::PUT, "/api/v1/settings", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("ma_mid_periods"));
        assert_eq!(state.settings().params.ma_mid_periods, vec![25, 33, 49]);

        let good = r#"{ "params": { "compression_period": 15 }, "interval": "1wk" }"#;
        let (status, body) = call(app, Method::PUT, "/api/v1/settings", Some(good)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["params"]["compression_period"], 15);
        assert_eq!(state.settings().interval, Interval::Weekly);
    }

    #[tokio::test]
    async fn screen_ranks_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(dir.path());

        let (status, body) = call(app.clone(), Method::GET, "/api/v1/screen", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["entries"][0]["symbol"], "AAPL");
        assert_eq!(body["entries"][0]["signal_count"], 1);
        assert_eq!(state.source.call_count(), 2);

        let (_, body) = call(app, Method::GET, "/api/v1/screen?only_signals=true", None).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["total"], 2);
        assert_eq!(state.source.call_count(), 2, "snapshot reused");
    }

    #[tokio::test]
    async fn analysis_returns_series_and_signal_dates() {
        let dir = tempfile::tempdir().unwrap();
        let (_, app) = app(dir.path());

        let (status, body) = call(app.clone(), Method::GET, "/api/v1/analysis/aapl", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["signal_count"], 1);
        assert_eq!(body["signal_dates"][0], "2023-09-08");
        assert_eq!(body["signals"].as_array().unwrap().len(), 300);
        assert_eq!(body["series"]["columns"][0]["name"], "EMA120");
        assert!(body["insufficient_data"].is_null());

        let (status, body) = call(app, Method::GET, "/api/v1/analysis/NOPE", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn cache_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(dir.path());
        state.refresh().await;
        assert_eq!(state.cache.len(), 2);

        let (status, body) =
            call(app.clone(), Method::POST, "/api/v1/cache/invalidate", Some(r#"{"symbol":"msft"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);

        let (_, body) = call(app, Method::POST, "/api/v1/cache/invalidate", Some("{}")).await;
        assert_eq!(body["removed"], 1);
        assert!(state.cache.is_empty());
    }
}
