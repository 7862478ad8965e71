//! Uploaded document kinds and the inline payload sent to the model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use licita_core::{Error, Result};
use serde::Serialize;

/// Accepted notice formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
}

impl DocumentKind {
    /// Detect document kind from a file name's extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Detect document kind from a declared MIME type.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }

    /// Resolve the kind of an upload: the extension wins, the declared type is the fallback.
    pub fn detect(filename: &str, declared_mime: Option<&str>) -> Result<Self> {
        Self::from_filename(filename)
            .or_else(|| declared_mime.and_then(Self::from_mime_type))
            .ok_or_else(|| {
                Error::UnsupportedDocument(format!(
                    "{} (aceitos: PDF, DOC, DOCX)",
                    if filename.is_empty() { "arquivo sem nome" } else { filename }
                ))
            })
    }
}

/// A document as carried in `inlineData` parts.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPayload {
    pub filename: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: u64,
    /// Base64 (standard alphabet, padded) file content.
    #[serde(skip_serializing)]
    pub data: String,
}

impl DocumentPayload {
    pub fn from_bytes(filename: impl Into<String>, kind: DocumentKind, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            mime_type: kind.mime_type().to_string(),
            size: bytes.len() as u64,
            data: STANDARD.encode(bytes),
        }
    }

    /// Size in megabytes with two decimals, as displayed next to the file name.
    pub fn size_mb(&self) -> String {
        format!("{:.2}", self.size as f64 / 1024.0 / 1024.0)
    }
}
