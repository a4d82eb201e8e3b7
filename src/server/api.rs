//! api.rs
//! HTTP routes: /health, /map, /map/markers, /map/mount, /map/unmount,
//! /map/bays/toggle, /stats, /legend and /auth/*.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, header::HOST, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify::LayerRole;
use crate::identity::{sign_in_url, AuthState, Identity};
use crate::models::types::{legend, LegendItem};
use crate::render::to_geojson;
use crate::session::{LayerView, MapController, MapStatus, MountOutcome};

static LEGEND: Lazy<Vec<LegendItem>> = Lazy::new(legend);

#[derive(Clone)]
pub struct ApiState {
    pub map: Arc<MapController>,
    pub identity: Arc<Identity>,
}

pub fn router(state: ApiState, web_dir: &str) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/map", get(get_map))
        .route("/map/markers", get(get_markers))
        .route("/map/mount", post(mount))
        .route("/map/unmount", post(unmount))
        .route("/map/bays/toggle", post(toggle_bays))
        .route("/stats", get(get_stats))
        .route("/legend", get(|| async { Json(&*LEGEND) }))
        .route("/auth/status", get(auth_status))
        .route("/auth/signin", get(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/token", post(accept_token))
        .fallback_service(ServeDir::new(web_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

// --------------------------------------
// Map
// --------------------------------------

#[derive(Serialize)]
struct MapSummary {
    status: MapStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    instance: Option<Uuid>,
    center: (f64, f64),
    zoom: u8,
    layers: Vec<LayerView>,
    bay_layers: Vec<String>,
    bays_visible: bool,
    bay_toggle_label: &'static str,
    parking_layer: Option<String>,
    marker_count: usize,
}

async fn get_map(State(state): State<ApiState>) -> Json<MapSummary> {
    let v = state.map.view().await;
    let bay_layers = v.layers.iter().filter(|l| l.role == LayerRole::Bay).map(|l| l.title.clone()).collect();
    Json(MapSummary {
        status: v.status(),
        bay_toggle_label: v.bay_toggle_label(),
        marker_count: v.markers.len(),
        message: v.error,
        instance: v.instance,
        center: v.center,
        zoom: v.zoom,
        layers: v.layers,
        bay_layers,
        bays_visible: v.bays_visible,
        parking_layer: v.parking_layer,
    })
}

/// Markers as GeoJSON with the right content-type.
async fn get_markers(State(state): State<ApiState>) -> Response {
    let v = state.map.view().await;
    if v.status() != MapStatus::Ready {
        return StatusCode::NO_CONTENT.into_response();
    }
    ([(CONTENT_TYPE, "application/geo+json; charset=utf-8")], to_geojson(&v.markers)).into_response()
}

async fn mount(State(state): State<ApiState>) -> Response {
    let token = state.identity.token().await;
    let outcome = state.map.mount(token).await;
    info!(?outcome, "mount requested");
    let (code, result) = match outcome {
        MountOutcome::Skipped => (StatusCode::CONFLICT, "skipped"),
        MountOutcome::Ready(_) => (StatusCode::OK, "ready"),
        MountOutcome::Failed(_) => (StatusCode::OK, "error"),
        MountOutcome::Abandoned(_) => (StatusCode::OK, "abandoned"),
    };
    let v = state.map.view().await;
    (code, Json(json!({ "result": result, "status": v.status(), "message": v.error }))).into_response()
}

async fn unmount(State(state): State<ApiState>) -> impl IntoResponse {
    let torn_down = state.map.unmount().await;
    Json(json!({ "unmounted": torn_down }))
}

async fn toggle_bays(State(state): State<ApiState>) -> impl IntoResponse {
    let visible = state.map.toggle_bays().await;
    Json(json!({
        "bays_visible": visible,
        "label": if visible { "Hide Bays" } else { "Show Bays" },
    }))
}

async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.map.view().await.statistics())
}

// --------------------------------------
// Auth
// --------------------------------------

async fn auth_status(State(state): State<ApiState>) -> Json<AuthState> {
    Json(state.identity.state().await)
}

#[derive(Deserialize)]
struct SignInParams {
    redirect_uri: Option<String>,
}

/// Sends the browser to the portal's OAuth dialog.
async fn sign_in(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(p): Query<SignInParams>,
) -> Response {
    let redirect = p.redirect_uri.unwrap_or_else(|| {
        let host = headers.get(HOST).and_then(|h| h.to_str().ok()).unwrap_or("localhost");
        format!("http://{host}/")
    });
    match sign_in_url(state.identity.config(), &redirect) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            warn!("sign-in unavailable: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.user_message() }))).into_response()
        }
    }
}

/// Keeps the map in step with the sign-in state: the current session is
/// always torn down, and reopened with the token only when signed in.
pub async fn follow_auth(state: &ApiState, auth: &AuthState) -> Option<MountOutcome> {
    state.map.unmount().await;
    if !auth.is_authenticated() {
        info!("map closed, not signed in");
        return None;
    }
    let outcome = state.map.mount(state.identity.token().await).await;
    info!(?outcome, "map reopened for signed-in user");
    Some(outcome)
}

async fn sign_out(State(state): State<ApiState>) -> Json<AuthState> {
    state.identity.sign_out().await;
    let auth = state.identity.state().await;
    follow_auth(&state, &auth).await;
    Json(auth)
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

async fn accept_token(State(state): State<ApiState>, Json(body): Json<TokenBody>) -> Response {
    if body.token.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "empty token" }))).into_response();
    }
    let auth = state.identity.accept_token(body.token).await;
    follow_auth(&state, &auth).await;
    Json(auth).into_response()
}
