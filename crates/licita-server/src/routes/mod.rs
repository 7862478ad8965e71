//! HTTP route handlers.

pub mod chat;
pub mod documents;
pub mod sessions;
pub mod status;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Json, Router};
use licita_core::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, TaskRejected, BUSY_MESSAGE};

/// Multipart framing allowance on top of the document size limit.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

pub(crate) type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = (state.config.max_upload_bytes + MULTIPART_OVERHEAD) as usize;

    Router::new()
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(sessions::routes())
        .merge(documents::routes())
        .merge(chat::routes())
}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

pub(crate) fn session_not_found(id: &str) -> ApiResponse {
    api_error(StatusCode::NOT_FOUND, format!("Session not found: {}", id))
}

pub(crate) fn task_rejected(id: &str, rejected: TaskRejected) -> ApiResponse {
    match rejected {
        TaskRejected::NotFound => session_not_found(id),
        TaskRejected::Busy => api_error(StatusCode::CONFLICT, BUSY_MESSAGE),
    }
}

pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::UnsupportedDocument(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::Ai(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
        Error::Io(_) | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::{Path, State};
    use axum::http::{header, Request};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use tower::ServiceExt;

    use crate::state::tests::test_state;
    use crate::state::SUMMARY_READY_MESSAGE;

    const STUB_ANSWER: &str = "O prazo de entrega é de 30 dias.";

    /// Stand-in for the Gemini API: summaries for plain requests, a fixed
    /// answer for requests carrying a system instruction.
    async fn stub_gemini(
        State(delay): State<Duration>,
        Path(call): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> Response {
        tokio::time::sleep(delay).await;

        if call.ends_with(":streamGenerateContent") {
            let chunks = [
                serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": "O prazo de entrega " }], "role": "model" } }]
                }),
                serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": "é de 30 dias." }], "role": "model" } }],
                    "usageMetadata": { "candidatesTokenCount": 9 }
                }),
            ];
            let body: String = chunks.iter().map(|c| format!("data: {}\r\n\r\n", c)).collect();
            return ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response();
        }

        let text = if body.get("systemInstruction").is_some() {
            STUB_ANSWER.to_string()
        } else {
            serde_json::json!({
                "licitante": { "nome": "Prefeitura de Exemplo", "cnpj": null },
                "objetoLicitacao": "Aquisição de papel A4",
                "portal": null,
                "requisitosHabilitacao": ["Contrato social"],
                "itensLicitados": [{ "item": "1", "descricao": "Papel A4", "quantidade": "100", "unidade": null }]
            })
            .to_string()
        };
        Json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" }, "finishReason": "STOP" }]
        }))
        .into_response()
    }

    async fn spawn_gemini_stub(delay: Duration) -> String {
        let app = Router::new()
            .route("/v1beta/models/{call}", post(stub_gemini))
            .with_state(delay);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn stub_state(dir: &std::path::Path, delay: Duration) -> Arc<AppState> {
        let state = test_state(dir);
        let base_url = spawn_gemini_stub(delay).await;
        {
            let mut config = state.gemini_config.write();
            config.api_key = Some("test-key".into());
            config.base_url = base_url;
        }
        state
    }

    async fn send_text(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let boundary = "licitaboundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                b = boundary,
                f = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_reports_ai_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.gemini_config.write().api_key = None;
        let app = build_router(state);

        let (status, json) = send(app, Request::get("/api/status").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["aiAvailable"], false);
        assert_eq!(json["provider"], "gemini");
        assert_eq!(json["activeSessions"], 0);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());

        let (status, created) = send(app.clone(), post_json("/api/sessions", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["chatEnabled"], false);
        assert!(created["file"].is_null());

        let uri = format!("/api/sessions/{}", id);
        let (status, snapshot) = send(app.clone(), Request::get(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["id"], id.as_str());
        assert_eq!(snapshot["messages"].as_array().unwrap().len(), 0);

        let (status, _) = send(app.clone(), Request::delete(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = send(app, Request::get(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains(&id));
    }

    #[tokio::test]
    async fn test_chat_without_document_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/chat", id);
        let (status, json) = send(app.clone(), post_json(&uri, serde_json::json!({ "message": "Qual o prazo?" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Nenhum arquivo foi processado para o chat.");
        assert!(state.with_session(&id, |s| s.log.is_empty()).unwrap());

        let (status, _) = send(app, post_json(&uri, serde_json::json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let (status, json) = send(app, multipart(&uri, "planilha.xlsx", b"data")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(json["error"].as_str().unwrap().contains("planilha.xlsx"));

        let error = state.with_session(&id, |s| s.error.clone()).unwrap();
        assert!(error.is_some());
        assert!(state.with_session(&id, |s| s.document.is_none()).unwrap());
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let content = vec![b'x'; 2048];
        let (status, json) = send(app, multipart(&uri, "edital.pdf", &content)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"], "O arquivo excede o limite de 0MB.");
        assert!(state.with_session(&id, |s| s.document.is_none()).unwrap());
    }

    #[tokio::test]
    async fn test_upload_without_key_keeps_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.gemini_config.write().api_key = None;
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let (status, json) = send(app, multipart(&uri, "edital.pdf", b"%PDF-1.4")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "Nenhuma chave de API do Gemini foi configurada.");

        let (busy, document) = state
            .with_session(&id, |s| (s.is_busy(), s.document.is_some()))
            .unwrap();
        assert!(!busy);
        assert!(!document);
    }

    #[tokio::test]
    async fn test_summary_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = state.create_session().id;
        let app = build_router(state);

        let uri = format!("/api/sessions/{}/summary", id);
        let (status, _) = send(app, Request::get(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_summarizes_document() {
        let dir = tempfile::tempdir().unwrap();
        let state = stub_state(dir.path(), Duration::ZERO).await;
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let (status, snapshot) = send(app.clone(), multipart(&uri, "edital.pdf", b"%PDF-1.4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["file"]["filename"], "edital.pdf");
        assert_eq!(snapshot["summary"]["objetoLicitacao"], "Aquisição de papel A4");
        assert_eq!(snapshot["summary"]["portal"], "");
        assert_eq!(snapshot["summary"]["licitante"]["cnpj"], "");
        assert_eq!(snapshot["messages"][0]["text"], SUMMARY_READY_MESSAGE);
        assert_eq!(snapshot["chatEnabled"], true);
        assert_eq!(snapshot["isSummarizing"], false);

        let summary_uri = format!("/api/sessions/{}/summary", id);
        let (status, json) = send(app, Request::get(&summary_uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["summary"]["requisitosHabilitacao"][0], "Contrato social");
    }

    #[tokio::test]
    async fn test_chat_answer_is_highlighted() {
        let dir = tempfile::tempdir().unwrap();
        let state = stub_state(dir.path(), Duration::ZERO).await;
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let (status, _) = send(app.clone(), multipart(&uri, "edital.pdf", b"%PDF-1.4")).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/sessions/{}/chat", id);
        let (status, json) = send(
            app.clone(),
            post_json(&uri, serde_json::json!({ "message": "Qual é o prazo de entrega?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"]["sender"], "ai");
        assert_eq!(json["message"]["text"], STUB_ANSWER);
        let segments = &json["message"]["segments"];
        assert_eq!(segments[1]["text"], "prazo");
        assert_eq!(segments[1]["isHighlighted"], true);
        assert_eq!(segments[3]["text"], "entrega");
        assert_eq!(segments[3]["isHighlighted"], true);

        let uri = format!("/api/sessions/{}/transcript", id);
        let (status, json) = send(app, Request::get(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 3);
        assert_eq!(json["messages"][1]["sender"], "user");
        assert!(!state.with_session(&id, |s| s.answering).unwrap());
    }

    #[tokio::test]
    async fn test_stream_answer_appends_to_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let state = stub_state(dir.path(), Duration::ZERO).await;
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let (status, _) = send(app.clone(), multipart(&uri, "edital.pdf", b"%PDF-1.4")).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/sessions/{}/chat/stream", id);
        let (status, body) = send_text(
            app,
            post_json(&uri, serde_json::json!({ "message": "Qual é o prazo de entrega?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""type":"token""#));
        assert!(body.contains(r#""type":"done""#));
        assert!(body.contains(r#""tokensUsed":9"#));
        assert!(body.contains(r#""type":"message""#));
        assert!(body.contains("[DONE]"));
        assert!(!body.contains(r#""type":"error""#));

        let (len, last, answering) = state
            .with_session(&id, |s| {
                let history = s.log.history();
                (history.len(), history.last().map(|m| m.text.clone()), s.answering)
            })
            .unwrap();
        assert_eq!(len, 3);
        assert_eq!(last.as_deref(), Some(STUB_ANSWER));
        assert!(!answering);
    }

    #[tokio::test]
    async fn test_concurrent_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = stub_state(dir.path(), Duration::from_millis(300)).await;
        let id = state.create_session().id;
        let app = build_router(state.clone());

        let uri = format!("/api/sessions/{}/document", id);
        let first = tokio::spawn(send(app.clone(), multipart(&uri, "primeiro.pdf", b"%PDF-A")));

        for _ in 0..200 {
            if state.with_session(&id, |s| s.summarizing).unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(state.with_session(&id, |s| s.summarizing).unwrap());

        let (status, json) = send(app, multipart(&uri, "segundo.pdf", b"%PDF-B")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], BUSY_MESSAGE);

        let (status, snapshot) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["file"]["filename"], "primeiro.pdf");
        let filename = state
            .with_session(&id, |s| s.document.as_ref().map(|d| d.filename.clone()))
            .unwrap();
        assert_eq!(filename.as_deref(), Some("primeiro.pdf"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::FileTooLarge { size: 2, limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_for(&Error::Ai("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&Error::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
