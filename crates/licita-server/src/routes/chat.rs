//! Question answering over the uploaded notice, plain and SSE.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures::Stream;
use licita_chat::gemini::StreamChunk;
use licita_chat::{AiError, AskRequest, DocumentPayload, GeminiClient, StreamEvent};
use licita_highlight::Message;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::{api_error, task_rejected, ApiResponse};
use crate::state::{AppState, Session, SessionTask, TaskKind, APOLOGY_MESSAGE, NO_DOCUMENT_MESSAGE};

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/{id}/chat", post(ask))
        .route("/sessions/{id}/chat/stream", post(stream_ask))
}

/// A question accepted for answering.
struct PendingAnswer {
    task: SessionTask,
    client: GeminiClient,
    document: DocumentPayload,
    question: String,
    /// Conversation before the question.
    history: Vec<Message>,
}

/// Validate the question, mark the session busy and append the user message.
fn begin_answer(state: &Arc<AppState>, id: &str, message: &str) -> Result<PendingAnswer, ApiResponse> {
    let question = message.trim();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message is required"));
    }

    let (task, prepared) = SessionTask::start_with(state, id, TaskKind::Answer, |s| {
        let document = s.document.clone()?;
        let history = s.log.history();
        s.log.push_user(question);
        s.error = None;
        Some((document, history))
    })
    .map_err(|r| task_rejected(id, r))?;

    let Some((document, history)) = prepared else {
        task.finish(|s| s.error = Some(NO_DOCUMENT_MESSAGE.to_string()));
        return Err(api_error(StatusCode::BAD_REQUEST, NO_DOCUMENT_MESSAGE));
    };

    let Some(client) = state.gemini_client() else {
        let err = AiError::NotConfigured;
        task.finish(|s| record_failure(s, &err));
        return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string()));
    };

    Ok(PendingAnswer {
        task,
        client,
        document,
        question: question.to_string(),
        history,
    })
}

fn record_failure(session: &mut Session, err: &AiError) {
    session.error = Some(err.to_string());
    session.log.push_ai(APOLOGY_MESSAGE);
}

/// POST /api/sessions/:id/chat — answer a question in one response.
async fn ask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let start = Instant::now();
    let pending = match begin_answer(&state, &id, &req.message) {
        Ok(pending) => pending,
        Err(response) => return response,
    };

    let result = pending
        .client
        .ask_question(&pending.document, &pending.question, &pending.history)
        .await;

    let outcome = pending.task.finish(|s| match result {
        Ok(answer) => {
            s.log.push_ai(answer);
            Ok(s.last_rendered())
        }
        Err(e) => {
            record_failure(s, &e);
            Err((e, s.last_rendered()))
        }
    });

    let duration = start.elapsed().as_millis() as u64;
    match outcome {
        Some(Ok(message)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": message,
                "model": pending.client.model(),
                "duration": duration,
            })),
        ),
        Some(Err((e, apology))) => {
            warn!(session = %id, cause = %e.cause(), "Answer failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": e.to_string(),
                    "message": apology,
                })),
            )
        }
        None => api_error(
            StatusCode::CONFLICT,
            "Session was reset while the question was being answered",
        ),
    }
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_default())
}

fn single_error_stream(error: String) -> SseStream {
    Box::pin(async_stream::stream! {
        yield Ok::<_, Infallible>(sse_event(&StreamEvent::Error { error }));
    })
}

/// POST /api/sessions/:id/chat/stream — answer as SSE `token` events.
///
/// The full answer is appended to the transcript when the model finishes and
/// echoed back, highlighted, in a final `message` event.
async fn stream_ask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Sse<SseStream> {
    let start = Instant::now();
    let pending = match begin_answer(&state, &id, &req.message) {
        Ok(pending) => pending,
        Err((_, Json(body))) => {
            let error = body["error"].as_str().unwrap_or("Request rejected").to_string();
            return Sse::new(single_error_stream(error));
        }
    };

    let PendingAnswer {
        task,
        client,
        document,
        question,
        history,
    } = pending;
    let llm_stream = client.stream_answer(&document, &question, &history);
    let model = client.model().to_string();

    let sse_stream: SseStream = Box::pin(async_stream::stream! {
        let mut llm_stream = llm_stream;
        let mut answer = String::new();

        while let Some(chunk) = llm_stream.next().await {
            match chunk {
                StreamChunk::Token(text) => {
                    answer.push_str(&text);
                    yield Ok::<_, Infallible>(sse_event(&StreamEvent::Token { content: text }));
                }
                StreamChunk::Done { tokens_used } => {
                    let rendered = task
                        .finish(|s| {
                            s.log.push_ai(answer.clone());
                            s.last_rendered()
                        })
                        .flatten();
                    yield Ok(sse_event(&StreamEvent::Done {
                        model: model.clone(),
                        tokens_used,
                        duration: start.elapsed().as_millis() as u64,
                    }));
                    if let Some(message) = rendered {
                        yield Ok(sse_event(&StreamEvent::Message { message }));
                    }
                    yield Ok(Event::default().data("[DONE]".to_string()));
                    return;
                }
                StreamChunk::Error(cause) => {
                    let err = AiError::Answer { cause };
                    warn!(cause = %err.cause(), "Streamed answer failed");
                    task.finish(|s| record_failure(s, &err));
                    yield Ok(sse_event(&StreamEvent::Error { error: err.to_string() }));
                    return;
                }
            }
        }

        debug!("Answer stream ended without a completion marker");
        let err = AiError::Answer { cause: "stream ended early".into() };
        task.finish(|s| record_failure(s, &err));
        yield Ok(sse_event(&StreamEvent::Error { error: err.to_string() }));
    });

    Sse::new(sse_stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use licita_chat::{DocumentKind, SummaryData};

    #[test]
    fn test_begin_answer_appends_question() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.gemini_config.write().api_key = Some("test-key".into());
        let id = state.create_session().id;
        state.with_session(&id, |s| {
            s.document = Some(DocumentPayload::from_bytes("edital.pdf", DocumentKind::Pdf, b"%PDF"));
            s.summary = Some(SummaryData::default());
            s.log.push_ai("Resumo do edital gerado.");
            s.error = Some("erro anterior".into());
        });

        let pending = begin_answer(&state, &id, "  Qual o prazo?  ").ok().unwrap();
        assert_eq!(pending.question, "Qual o prazo?");
        assert_eq!(pending.history.len(), 1);

        let (len, answering, error) = state
            .with_session(&id, |s| (s.log.len(), s.answering, s.error.clone()))
            .unwrap();
        assert_eq!(len, 2);
        assert!(answering);
        assert!(error.is_none());

        let rejected = begin_answer(&state, &id, "Outra pergunta").err().unwrap();
        assert_eq!(rejected.0, StatusCode::CONFLICT);

        drop(pending);
        assert!(!state.with_session(&id, |s| s.answering).unwrap());
    }

    #[test]
    fn test_missing_key_records_apology() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.gemini_config.write().api_key = None;
        let id = state.create_session().id;
        state.with_session(&id, |s| {
            s.document = Some(DocumentPayload::from_bytes("edital.pdf", DocumentKind::Pdf, b"%PDF"));
        });

        let rejected = begin_answer(&state, &id, "Qual o prazo?").err().unwrap();
        assert_eq!(rejected.0, StatusCode::SERVICE_UNAVAILABLE);

        let messages = state.with_session(&id, |s| s.log.history()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, APOLOGY_MESSAGE);
        assert!(!state.with_session(&id, |s| s.answering).unwrap());
    }

    #[test]
    fn test_stream_event_wire_shape() {
        let json = serde_json::to_value(StreamEvent::Token {
            content: "prazo".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "token");

        let message = licita_highlight::render_transcript(&[
            Message::user("Qual o prazo?"),
            Message::ai("O prazo é curto."),
        ])
        .pop()
        .unwrap();
        let json = serde_json::to_value(StreamEvent::Message { message }).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["message"]["sender"], "ai");
        assert_eq!(json["message"]["segments"][1]["isHighlighted"], true);
    }
}
