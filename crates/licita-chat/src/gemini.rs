//! Gemini `generateContent` client: summarization, question answering, streaming.
//!
//! The notice travels as an `inlineData` part on every request. Answers are
//! restricted to the document by the system instruction.

use std::pin::Pin;

use futures::Stream;
use licita_core::{Error, Result};
use licita_highlight::{Message, Sender};
use reqwest::Client;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::config::ResolvedModel;
use crate::document::DocumentPayload;
use crate::error::AiError;
use crate::schema::summary_schema_for_request;
use crate::summary::SummaryData;

pub const SUMMARY_PROMPT: &str = "Você é um especialista em análise de editais de licitação. \
Sua tarefa é extrair as informações chave do documento fornecido, conforme o schema JSON. \
É crucial que você detalhe **todos os requisitos de habilitação** encontrados. \
**Não extraia a lista de itens individuais da licitação**. \
Se uma informação não for encontrada, retorne uma string vazia ou um array vazio para o campo correspondente.";

/// Exact answer the model gives when the document does not cover a question.
pub const NOT_FOUND_ANSWER: &str = "Essa informação não foi encontrada no edital enviado.";

pub const ANSWER_INSTRUCTION: &str = "Você é um assistente de IA focado em responder perguntas sobre um edital de licitação. \
Responda APENAS com base no conteúdo do documento fornecido. Seja formal, técnico e claro. \
Se a informação solicitada não estiver presente no documento, responda EXATAMENTE com a frase: \
'Essa informação não foi encontrada no edital enviado.' \
Não adicione nenhuma outra informação ou explicação se a resposta não for encontrada.";

/// Boxed stream type for streamed answers.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

fn inline_data(doc: &DocumentPayload) -> Value {
    json!({ "inlineData": { "mimeType": doc.mime_type, "data": doc.data } })
}

fn role_for(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "user",
        Sender::Ai => "model",
    }
}

/// Text part carrying the user's question alongside the attached notice.
pub fn question_text(question: &str) -> String {
    format!(
        "Contexto do edital fornecido como um anexo. Pergunta do usuário: \"{}\"",
        question
    )
}

fn generation_config(temperature: Option<f64>) -> Value {
    let mut config = json!({});
    if let Some(t) = temperature {
        config["temperature"] = json!(t);
    }
    config
}

/// Request body for the structured summary.
pub fn build_summary_request(doc: &DocumentPayload, temperature: Option<f64>) -> Value {
    let mut config = generation_config(temperature);
    config["responseMimeType"] = json!("application/json");
    config["responseSchema"] = summary_schema_for_request();

    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": SUMMARY_PROMPT }, inline_data(doc)],
        }],
        "generationConfig": config,
    })
}

/// Request body for a follow-up question.
///
/// Consecutive turns by the same role are merged into one content entry; the
/// API requires alternating roles, and the log may hold two AI messages in a
/// row after a failed answer.
pub fn build_question_request(
    doc: &DocumentPayload,
    question: &str,
    history: &[Message],
    temperature: Option<f64>,
) -> Value {
    let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();
    for msg in history {
        push_turn(&mut turns, role_for(msg.sender), json!({ "text": msg.text }));
    }
    push_turn(&mut turns, "user", json!({ "text": question_text(question) }));
    push_turn(&mut turns, "user", inline_data(doc));

    let contents: Vec<Value> = turns
        .into_iter()
        .map(|(role, parts)| json!({ "role": role, "parts": parts }))
        .collect();

    json!({
        "systemInstruction": { "parts": [{ "text": ANSWER_INSTRUCTION }] },
        "contents": contents,
        "generationConfig": generation_config(temperature),
    })
}

fn push_turn(turns: &mut Vec<(&'static str, Vec<Value>)>, role: &'static str, part: Value) {
    if let Some((last_role, parts)) = turns.last_mut() {
        if *last_role == role {
            parts.push(part);
            return;
        }
    }
    turns.push((role, vec![part]));
}

/// Concatenated text of the first candidate, skipping thought parts.
pub fn candidate_text(response: &Value) -> Result<String> {
    let candidate = match response["candidates"].get(0) {
        Some(c) => c,
        None => {
            let reason = response["promptFeedback"]["blockReason"]
                .as_str()
                .unwrap_or("no candidates");
            return Err(Error::Ai(format!("Empty response: {}", reason)));
        }
    };

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p["thought"].as_bool().unwrap_or(false))
                .filter_map(|p| p["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
        return Err(Error::Ai(format!("Candidate has no text (finishReason={})", reason)));
    }
    Ok(text)
}

/// Parse the model's JSON summary. Tolerates a surrounding markdown code fence.
pub fn parse_summary(text: &str) -> Result<SummaryData> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(unfenced.trim())?)
}

/// One `data:` payload of a streamed response.
#[derive(Debug, Default, PartialEq)]
pub struct StreamDelta {
    pub text: String,
    pub output_tokens: Option<usize>,
}

/// Decode an SSE `data:` payload. `Err` carries an API error message.
pub fn parse_stream_data(data: &str) -> std::result::Result<StreamDelta, String> {
    let parsed: Value = serde_json::from_str(data).map_err(|e| format!("Malformed chunk: {}", e))?;

    if let Some(message) = parsed["error"]["message"].as_str() {
        return Err(message.to_string());
    }

    let text: String = parsed["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p["thought"].as_bool().unwrap_or(false))
                .filter_map(|p| p["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    let output_tokens = parsed["usageMetadata"]["candidatesTokenCount"]
        .as_u64()
        .map(|n| n as usize);

    Ok(StreamDelta {
        text,
        output_tokens,
    })
}

/// Client bound to one resolved model.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    resolved: ResolvedModel,
}

impl GeminiClient {
    pub fn new(client: Client, resolved: ResolvedModel) -> Self {
        Self { client, resolved }
    }

    pub fn model(&self) -> &str {
        &self.resolved.model
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.resolved.base_url.trim_end_matches('/'),
            self.resolved.model,
            method
        )
    }

    async fn generate(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url("generateContent"))
            .header("x-goog-api-key", &self.resolved.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("API error {}: {}", status, body)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Http(format!("Invalid response body: {}", e)))
    }

    /// Extract the structured summary of a notice.
    pub async fn summarize_document(
        &self,
        doc: &DocumentPayload,
    ) -> std::result::Result<SummaryData, AiError> {
        debug!(
            model = %self.resolved.model,
            filename = %doc.filename,
            size = doc.size,
            "Requesting summary"
        );

        let body = build_summary_request(doc, self.resolved.temperature);
        let result = async {
            let response = self.generate(&body).await?;
            parse_summary(&candidate_text(&response)?)
        }
        .await;

        result.map_err(|e| {
            error!("Error summarizing document: {}", e);
            AiError::Summarize {
                cause: e.to_string(),
            }
        })
    }

    /// Answer a question about the notice. `history` excludes the question itself.
    pub async fn ask_question(
        &self,
        doc: &DocumentPayload,
        question: &str,
        history: &[Message],
    ) -> std::result::Result<String, AiError> {
        debug!(
            model = %self.resolved.model,
            history = history.len(),
            "Asking question"
        );

        let body = build_question_request(doc, question, history, self.resolved.temperature);
        let result = async {
            let response = self.generate(&body).await?;
            candidate_text(&response)
        }
        .await;

        result.map_err(|e| {
            error!("Error asking question: {}", e);
            AiError::Answer {
                cause: e.to_string(),
            }
        })
    }

    /// Stream the answer to a question token by token.
    pub fn stream_answer(
        &self,
        doc: &DocumentPayload,
        question: &str,
        history: &[Message],
    ) -> BoxedStream {
        let client = self.client.clone();
        let url = format!("{}?alt=sse", self.url("streamGenerateContent"));
        let api_key = self.resolved.api_key.clone();
        let model = self.resolved.model.clone();
        let body = build_question_request(doc, question, history, self.resolved.temperature);

        Box::pin(async_stream::stream! {
            debug!("Streaming answer from {}", model);

            let response = match client
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    yield StreamChunk::Error(format!("Request failed: {}", e));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                yield StreamChunk::Error(format!("API error {}: {}", status, body));
                return;
            }

            let mut stream = response.bytes_stream();
            // Raw bytes: a chunk boundary may split a multi-byte character.
            let mut buffer: Vec<u8> = Vec::new();
            let mut token_count = 0usize;
            let mut reported_tokens = None;

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield StreamChunk::Error(format!("Stream read error: {}", e));
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&line_bytes).trim().to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data:") {
                        match parse_stream_data(data.trim()) {
                            Ok(delta) => {
                                if delta.output_tokens.is_some() {
                                    reported_tokens = delta.output_tokens;
                                }
                                if !delta.text.is_empty() {
                                    token_count += 1;
                                    yield StreamChunk::Token(delta.text);
                                }
                            }
                            Err(msg) => {
                                error!("Gemini stream error: {}", msg);
                                yield StreamChunk::Error(msg);
                                return;
                            }
                        }
                    }
                }
            }

            yield StreamChunk::Done { tokens_used: reported_tokens.unwrap_or(token_count) };
        })
    }
}

/// Test an API key by listing models.
pub async fn test_api_key(client: &Client, base_url: &str, api_key: &str) -> std::result::Result<(), String> {
    let resp = client
        .get(format!("{}/v1beta/models", base_url.trim_end_matches('/')))
        .header("x-goog-api-key", api_key)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(format!("API returned status {}", resp.status()))
    }
}
