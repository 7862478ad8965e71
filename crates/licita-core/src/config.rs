//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Upload ceiling applied when `LICITA_MAX_UPLOAD_MB` is unset (50 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Idle time after which a session is dropped, unless `LICITA_SESSION_TTL_MINUTES` says otherwise.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Paths to the Licita data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// AI provider configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the root if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            llm_config_file: root.join("llm-config.json"),
            root,
        })
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicitaConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Largest accepted document, in bytes.
    pub max_upload_bytes: u64,
    /// Sessions untouched for longer than this are evicted.
    pub session_ttl_secs: u64,
}

impl LicitaConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3003);

        let max_upload_bytes = scaled_env(
            "LICITA_MAX_UPLOAD_MB",
            std::env::var("LICITA_MAX_UPLOAD_MB").ok(),
            BYTES_PER_MB,
            DEFAULT_MAX_UPLOAD_BYTES,
        );
        let session_ttl_secs = scaled_env(
            "LICITA_SESSION_TTL_MINUTES",
            std::env::var("LICITA_SESSION_TTL_MINUTES").ok(),
            60,
            DEFAULT_SESSION_TTL_SECS,
        );

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            max_upload_bytes,
            session_ttl_secs,
        })
    }

    /// Upload limit rendered in whole megabytes, as shown to users.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / BYTES_PER_MB
    }
}

/// Parse a positive integer env value and multiply it by `unit`.
///
/// Unset, unparsable, zero or overflowing values fall back to `default`.
fn scaled_env(name: &str, raw: Option<String>, unit: u64, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => match n.checked_mul(unit) {
            Some(scaled) => scaled,
            None => {
                warn!("Ignoring out-of-range {}={:?}", name, raw);
                default
            }
        },
        _ => {
            warn!("Ignoring invalid {}={:?}", name, raw);
            default
        }
    }
}
