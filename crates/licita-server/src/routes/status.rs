//! Service status and Gemini configuration routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use licita_chat::config::DEFAULT_GEMINI_BASE_URL;
use licita_chat::gemini::test_api_key;
use licita_chat::{ChatStatus, GeminiConfigUpdate, TestKeyRequest};
use tracing::{info, warn};

use super::api_error;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/config", get(get_config).put(update_config))
        .route("/config/test", post(test_key))
}

/// GET /api/status — AI availability and session count.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<ChatStatus> {
    let (resolved, available_models) = {
        let config = state.gemini_config.read();
        (config.resolve(), config.available_models())
    };

    Json(ChatStatus {
        ai_available: resolved.is_some(),
        provider: "gemini",
        model: resolved.map(|r| r.model),
        available_models,
        active_sessions: state.sessions.read().len(),
        max_upload_mb: state.config.max_upload_mb(),
    })
}

/// GET /api/config — masked Gemini configuration.
async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.gemini_config.read().to_response())
}

/// PUT /api/config — update and persist.
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<GeminiConfigUpdate>,
) -> impl IntoResponse {
    let mut config = state.gemini_config.write();
    config.apply_update(&update);

    if let Err(e) = config.save() {
        warn!("Failed to save Gemini config: {}", e);
        return api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save config: {}", e),
        );
    }
    info!(model = %config.model, "Gemini config updated");

    match serde_json::to_value(config.to_response()) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/config/test — check a key against the models endpoint.
async fn test_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TestKeyRequest>,
) -> impl IntoResponse {
    let base_url = {
        let config = state.gemini_config.read();
        if config.base_url.is_empty() {
            DEFAULT_GEMINI_BASE_URL.to_string()
        } else {
            config.base_url.clone()
        }
    };

    match test_api_key(&state.http, &base_url, &req.api_key).await {
        Ok(()) => Json(serde_json::json!({ "success": true })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e })),
    }
}
