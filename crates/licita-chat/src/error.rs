//! AI call failures and the messages shown for them.

use thiserror::Error;

pub const SUMMARY_FAILED: &str = "Não foi possível gerar o resumo do edital.";
pub const ANSWER_FAILED: &str = "Ocorreu um erro ao processar sua pergunta.";
pub const NOT_CONFIGURED: &str = "Nenhuma chave de API do Gemini foi configurada.";

/// Failure of a call to the AI service.
///
/// `Display` is the user-facing message; the underlying cause is kept for logs.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("{}", NOT_CONFIGURED)]
    NotConfigured,

    #[error("{}", SUMMARY_FAILED)]
    Summarize { cause: String },

    #[error("{}", ANSWER_FAILED)]
    Answer { cause: String },
}

impl AiError {
    /// Technical cause, for logging.
    pub fn cause(&self) -> &str {
        match self {
            AiError::NotConfigured => "no API key",
            AiError::Summarize { cause } | AiError::Answer { cause } => cause,
        }
    }
}

impl From<AiError> for licita_core::Error {
    fn from(e: AiError) -> Self {
        licita_core::Error::Ai(e.to_string())
    }
}
