use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use common::api::success_response;

use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    success_response(json!({
        "status": "ok",
        "service": "gateway",
    }))
}

pub async fn detailed_health(State(state): State<AppState>) -> impl IntoResponse {
    success_response(json!({
        "status": "ok",
        "service": "gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "websocket_sessions": state.hub.session_count(),
    }))
}
