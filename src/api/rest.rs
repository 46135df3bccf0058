// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Health is public; everything else
// goes through the `AuthBearer` extractor (a no-op unless an admin token is
// configured). Mutating endpoints are thin wrappers around the command
// functions in `engine.rs`.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::engine::Engine;
use crate::runtime_config::{RuntimeConfig, CONFIG_PATH};
use crate::telemetry::{unix_now, window};
use crate::types::ViewKind;
use crate::views::PALETTES;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/devices", get(devices))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config", post(set_config))
        .route("/api/v1/control/scan/toggle", post(control_scan_toggle))
        .route("/api/v1/control/view", post(control_view))
        .route("/api/v1/control/device", post(control_device))
        .route("/api/v1/control/palette", post(control_palette))
        .route("/api/v1/control/reset", post(control_reset))
        .route("/api/v1/control/save", post(control_save))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Full state snapshot (authenticated)
// =============================================================================

async fn full_state(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    Json(snapshot)
}

// =============================================================================
// Devices (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct DevicesQuery {
    /// Window length for the aggregation; defaults to the ranking window.
    window_secs: Option<f64>,
}

async fn devices(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DevicesQuery>,
) -> impl IntoResponse {
    let cutoff = query
        .window_secs
        .unwrap_or_else(|| state.runtime_config.read().windows.ranking_window_secs);

    let samples = state.sample_log.snapshot();
    let rows = window::device_aggregates(&samples, unix_now(), cutoff);
    Json(rows)
}

// =============================================================================
// Config (authenticated)
// =============================================================================

async fn get_config(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.runtime_config.read().clone();
    Json(config)
}

/// Replace the runtime config wholesale. Missing fields fall back to their
/// defaults through serde, so partial documents are accepted. The new config
/// is persisted best-effort; simulator shape changes take effect on restart.
async fn set_config(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(new_config): Json<RuntimeConfig>,
) -> impl IntoResponse {
    *state.runtime_config.write() = new_config.clone();
    info!("runtime config replaced via API");

    if let Err(e) = new_config.save(CONFIG_PATH) {
        warn!(error = %e, "failed to save runtime config to disk");
    }

    state.increment_version();
    Json(new_config)
}

// =============================================================================
// Control endpoints (authenticated)
// =============================================================================

#[derive(Serialize)]
struct ScanToggleResponse {
    scanning: bool,
    message: String,
}

async fn control_scan_toggle(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let scanning = Engine::toggle_scanning(&state);

    Json(ScanToggleResponse {
        scanning,
        message: if scanning {
            "Discovery started".to_string()
        } else {
            "Discovery stopped".to_string()
        },
    })
}

#[derive(Deserialize)]
struct ViewRequest {
    view: ViewKind,
}

#[derive(Serialize)]
struct ViewResponse {
    active_view: ViewKind,
}

async fn control_view(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ViewRequest>,
) -> impl IntoResponse {
    Engine::select_view(&state, req.view);

    Json(ViewResponse {
        active_view: req.view,
    })
}

#[derive(Deserialize)]
struct DeviceRequest {
    device_id: String,
}

async fn control_device(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if !Engine::select_device(&state, &req.device_id) {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "Device selection requires the series view to be active",
            })),
        ));
    }

    Ok(Json(serde_json::json!({
        "selected": req.device_id,
    })))
}

#[derive(Deserialize)]
struct PaletteRequest {
    palette: String,
}

async fn control_palette(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaletteRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if !Engine::set_palette(&state, &req.palette) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!(
                    "Unknown palette '{}' or waterfall view not active",
                    req.palette
                ),
                "palettes": PALETTES,
            })),
        ));
    }

    Ok(Json(serde_json::json!({
        "palette": req.palette,
    })))
}

async fn control_reset(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Engine::reset_data(&state);
    let session = state.sample_log.session();

    Json(serde_json::json!({
        "message": "Sample log cleared",
        "session": session,
    }))
}

#[derive(Deserialize)]
struct SaveRequest {
    #[serde(default)]
    path: Option<String>,
}

async fn control_save(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    body: Option<Json<SaveRequest>>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let path = body
        .and_then(|Json(req)| req.path)
        .map(PathBuf::from);

    match Engine::save_data(&state, path) {
        Ok((written_path, rows)) => Ok(Json(serde_json::json!({
            "path": written_path.display().to_string(),
            "rows": rows,
        }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": format!("{e:#}"),
            })),
        )),
    }
}
