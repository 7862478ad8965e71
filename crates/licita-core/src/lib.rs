//! Licita Core — error taxonomy, configuration, data directory layout.

pub mod config;
pub mod error;

pub use config::{DataPaths, LicitaConfig, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SESSION_TTL_SECS};
pub use error::{Error, Result};
