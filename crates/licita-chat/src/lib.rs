//! Document summarization and question answering over Google Gemini.
//!
//! The document is sent inline (base64) with every request; nothing is
//! uploaded to provider-side storage. Prompts and user-facing failure
//! messages are in Portuguese, matching the notices being analyzed.

pub mod config;
pub mod document;
pub mod error;
pub mod gemini;
pub mod schema;
pub mod summary;
pub mod types;

pub use config::{GeminiConfig, ResolvedModel};
pub use document::{DocumentKind, DocumentPayload};
pub use error::AiError;
pub use gemini::GeminiClient;
pub use summary::{ItemLicitado, Licitante, SummaryData, SummarySection};
pub use types::*;
