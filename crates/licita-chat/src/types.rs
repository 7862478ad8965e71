//! Chat and configuration types exposed over the HTTP API.

use licita_highlight::RenderedMessage;
use serde::{Deserialize, Serialize};

/// Incoming question for a session.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub message: String,
}

/// SSE stream event types.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "token")]
    Token { content: String },
    #[serde(rename = "done")]
    Done {
        model: String,
        #[serde(rename = "tokensUsed")]
        tokens_used: usize,
        duration: u64,
    },
    #[serde(rename = "error")]
    Error { error: String },
    /// The message appended to the transcript once the stream ends.
    #[serde(rename = "message")]
    Message { message: RenderedMessage },
}

/// Service status response.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStatus {
    #[serde(rename = "aiAvailable")]
    pub ai_available: bool,
    pub provider: &'static str,
    pub model: Option<String>,
    #[serde(rename = "availableModels")]
    pub available_models: Vec<String>,
    #[serde(rename = "activeSessions")]
    pub active_sessions: usize,
    #[serde(rename = "maxUploadMb")]
    pub max_upload_mb: u64,
}

/// Gemini config response (key masked).
#[derive(Debug, Clone, Serialize)]
pub struct GeminiConfigResponse {
    #[serde(rename = "apiKeyConfigured")]
    pub api_key_configured: bool,
    pub model: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Gemini config update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiConfigUpdate {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
}

/// API key test request.
#[derive(Debug, Clone, Deserialize)]
pub struct TestKeyRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}
