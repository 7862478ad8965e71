//! Session lifecycle and transcript routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use super::session_not_found;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/reset", post(reset_session))
        .route("/sessions/{id}/transcript", get(get_transcript))
}

/// POST /api/sessions — start an empty session.
async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.create_session();
    (StatusCode::CREATED, Json(session.snapshot()))
}

/// GET /api/sessions/:id — full session snapshot.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.with_session(&id, |s| s.snapshot()) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)),
        None => session_not_found(&id),
    }
}

/// DELETE /api/sessions/:id
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !state.remove_session(&id) {
        return session_not_found(&id);
    }
    info!(session = %id, "Session deleted");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "deleted": true, "id": id })),
    )
}

/// POST /api/sessions/:id/reset — drop document, summary and transcript.
///
/// Allowed while an AI call is in flight; its result is then discarded.
async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let snapshot = state.with_session(&id, |s| {
        s.reset();
        s.snapshot()
    });
    match snapshot {
        Some(snapshot) => {
            info!(session = %id, "Session reset");
            (StatusCode::OK, Json(snapshot))
        }
        None => session_not_found(&id),
    }
}

/// GET /api/sessions/:id/transcript — messages with highlight segments.
async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let messages = state.with_session(&id, |s| s.log.messages().to_vec());
    match messages {
        Some(messages) => {
            let rendered = licita_highlight::render_transcript(&messages);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "messages": rendered,
                    "total": rendered.len(),
                })),
            )
        }
        None => session_not_found(&id),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::build_router;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn test_transcript_highlights_answer() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = state.create_session().id;
        state.with_session(&id, |s| {
            s.log.push_ai("Resumo do edital gerado.");
            s.log.push_user("Qual é o prazo de entrega?");
            s.log.push_ai("O Prazo de entrega é de 30 dias.");
        });

        let app = build_router(state);
        let uri = format!("/api/sessions/{}/transcript", id);
        let response = app
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["total"], 3);

        let first = &json["messages"][0]["segments"];
        assert_eq!(first.as_array().unwrap().len(), 1);
        assert_eq!(first[0]["isHighlighted"], false);

        let answer: Vec<(String, bool)> = json["messages"][2]["segments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| {
                (
                    s["text"].as_str().unwrap().to_string(),
                    s["isHighlighted"].as_bool().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            answer,
            vec![
                ("O ".to_string(), false),
                ("Prazo".to_string(), true),
                (" de ".to_string(), false),
                ("entrega".to_string(), true),
                (" é de 30 dias.".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_clears_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = state.create_session().id;
        state.with_session(&id, |s| s.log.push_user("Qual o prazo?"));

        let app = build_router(state.clone());
        let uri = format!("/api/sessions/{}/reset", id);
        let response = app
            .oneshot(Request::post(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.with_session(&id, |s| s.log.is_empty()).unwrap());
        assert_eq!(state.with_session(&id, |s| s.generation).unwrap(), 1);
    }
}
