//! Gemini configuration persistence and model resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{GeminiConfigResponse, GeminiConfigUpdate};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const GEMINI_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"];

/// Stored Gemini configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.into()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            temperature: None,
            config_path: PathBuf::new(),
        }
    }
}

/// Everything a client needs to call the model.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: Option<f64>,
}

impl GeminiConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: GeminiConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for the API key
        if config.api_key.is_none() {
            config.api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved Gemini config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config. An empty key clears it.
    pub fn apply_update(&mut self, update: &GeminiConfigUpdate) {
        if let Some(k) = &update.api_key {
            let k = k.trim();
            self.api_key = if k.is_empty() { None } else { Some(k.to_string()) };
        }
        if let Some(m) = &update.model {
            self.model = m.clone();
        }
        if let Some(u) = &update.base_url {
            self.base_url = u.trim_end_matches('/').to_string();
        }
        if let Some(t) = update.temperature {
            self.temperature = Some(t);
        }
    }

    /// The model to call, if an API key is configured.
    pub fn resolve(&self) -> Option<ResolvedModel> {
        self.api_key.as_ref().map(|key| ResolvedModel {
            model: self.model.clone(),
            api_key: key.clone(),
            base_url: self.base_url.clone(),
            temperature: self.temperature,
        })
    }

    /// Build the public config response (no API key exposed).
    pub fn to_response(&self) -> GeminiConfigResponse {
        GeminiConfigResponse {
            api_key_configured: self.api_key.is_some(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            temperature: self.temperature,
        }
    }

    /// Models offered for selection.
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<String> = GEMINI_MODELS.iter().map(|s| s.to_string()).collect();
        if !models.contains(&self.model) {
            models.push(self.model.clone());
        }
        models
    }
}
