//! Document upload and summary routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use licita_chat::{AiError, DocumentKind, DocumentPayload};
use licita_core::Error;
use tracing::{info, warn};

use super::{api_error, session_not_found, status_for, task_rejected, ApiResponse, MULTIPART_OVERHEAD};
use crate::state::{AppState, SessionTask, TaskKind, BUSY_MESSAGE, SUMMARY_READY_MESSAGE};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/{id}/document", post(upload_document))
        .route("/sessions/{id}/summary", get(get_summary))
        .route("/sessions/{id}/summary/export", get(export_summary))
}

struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// First file field of the form.
async fn read_upload(multipart: &mut Multipart, limit: u64) -> licita_core::Result<Upload> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(Error::InvalidRequest("No file in upload".into())),
            Err(e) => return Err(multipart_error(e.status(), e.body_text(), limit)),
        };

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        return match field.bytes().await {
            Ok(bytes) => Ok(Upload {
                filename,
                content_type,
                bytes,
            }),
            Err(e) => Err(multipart_error(e.status(), e.body_text(), limit)),
        };
    }
}

fn multipart_error(status: StatusCode, text: String, limit: u64) -> Error {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        // Body limit hit mid-stream; the real size is unknown, this is a lower bound.
        Error::FileTooLarge {
            size: limit + MULTIPART_OVERHEAD,
            limit,
        }
    } else {
        Error::InvalidRequest(text)
    }
}

/// Check size and type of an upload.
pub(crate) fn validate_upload(
    filename: &str,
    declared_mime: Option<&str>,
    size: u64,
    limit: u64,
) -> licita_core::Result<DocumentKind> {
    if size > limit {
        return Err(Error::FileTooLarge { size, limit });
    }
    if size == 0 {
        return Err(Error::InvalidRequest(format!("{} está vazio", filename)));
    }
    DocumentKind::detect(filename, declared_mime)
}

/// Message shown to the user for a rejected upload.
pub(crate) fn upload_message(err: &Error) -> String {
    match err {
        Error::FileTooLarge { limit, .. } => {
            format!("O arquivo excede o limite de {}MB.", limit / (1024 * 1024))
        }
        Error::UnsupportedDocument(detail) => format!("Formato de arquivo não suportado: {}", detail),
        other => other.to_string(),
    }
}

/// Reset the session and keep the rejection as its error.
fn reject_upload(state: &AppState, id: &str, err: Error) -> ApiResponse {
    warn!(session = %id, "Upload rejected: {}", err);
    fail_upload(state, id, status_for(&err), upload_message(&err))
}

/// Reset an idle session to an error state. A session that turned busy
/// while the upload was read is left alone.
fn fail_upload(state: &AppState, id: &str, status: StatusCode, message: String) -> ApiResponse {
    let recorded = state.with_session(id, |s| {
        if s.is_busy() {
            return false;
        }
        s.reset();
        s.error = Some(message.clone());
        true
    });
    match recorded {
        None => session_not_found(id),
        Some(false) => api_error(StatusCode::CONFLICT, BUSY_MESSAGE),
        Some(true) => api_error(status, message),
    }
}

/// POST /api/sessions/:id/document — upload a notice and summarize it.
///
/// Any previous document, summary and transcript are discarded first.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    match state.with_session(&id, |s| s.is_busy()) {
        None => return session_not_found(&id),
        Some(true) => return api_error(StatusCode::CONFLICT, BUSY_MESSAGE),
        Some(false) => {}
    }

    let limit = state.config.max_upload_bytes;
    let upload = match read_upload(&mut multipart, limit).await {
        Ok(upload) => upload,
        Err(e) => return reject_upload(&state, &id, e),
    };
    let kind = match validate_upload(
        &upload.filename,
        upload.content_type.as_deref(),
        upload.bytes.len() as u64,
        limit,
    ) {
        Ok(kind) => kind,
        Err(e) => return reject_upload(&state, &id, e),
    };

    let document = DocumentPayload::from_bytes(upload.filename, kind, &upload.bytes);
    info!(
        session = %id,
        filename = %document.filename,
        size_mb = %document.size_mb(),
        "Document received"
    );

    let Some(client) = state.gemini_client() else {
        let message = AiError::NotConfigured.to_string();
        return fail_upload(&state, &id, StatusCode::SERVICE_UNAVAILABLE, message);
    };

    let started = SessionTask::start_with(&state, &id, TaskKind::Summarize, |s| {
        s.reset();
        s.document = Some(document.clone());
    });
    let task = match started {
        Ok((task, ())) => task,
        Err(rejected) => return task_rejected(&id, rejected),
    };

    let result = client.summarize_document(&document).await;

    let outcome = task.finish(|s| match result {
        Ok(summary) => {
            s.summary = Some(summary);
            s.log.push_ai(SUMMARY_READY_MESSAGE);
            Ok(s.snapshot())
        }
        Err(e) => {
            s.error = Some(e.to_string());
            s.document = None;
            Err(e)
        }
    });

    match outcome {
        Some(Ok(snapshot)) => {
            info!(session = %id, model = %client.model(), "Summary ready");
            (StatusCode::OK, Json(snapshot))
        }
        Some(Err(e)) => {
            warn!(session = %id, cause = %e.cause(), "Summary failed");
            api_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
        None => api_error(
            StatusCode::CONFLICT,
            "Session was reset while the document was being processed",
        ),
    }
}

/// GET /api/sessions/:id/summary — summary and its display sections.
async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.with_session(&id, |s| s.summary.clone()) {
        None => session_not_found(&id),
        Some(None) => api_error(StatusCode::NOT_FOUND, "No summary for this session"),
        Some(Some(summary)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "sections": summary.sections(),
                "summary": summary,
            })),
        ),
    }
}

/// GET /api/sessions/:id/summary/export — markdown download.
async fn export_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.with_session(&id, |s| s.summary.clone()) {
        None => session_not_found(&id).into_response(),
        Some(None) => {
            api_error(StatusCode::NOT_FOUND, "No summary for this session").into_response()
        }
        Some(Some(summary)) => (
            [
                (header::CONTENT_TYPE, "text/markdown; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"resumo-edital.md\"",
                ),
            ],
            summary.to_markdown(),
        )
            .into_response(),
    }
}
