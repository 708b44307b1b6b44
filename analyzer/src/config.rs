use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use crate::pipeline::classifier::VotingStrategy;

const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
    pub classifier: ClassifierConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Resolution used when rasterizing PDF pages for OCR.
    pub ocr_dpi: u32,
    pub ocr_language: String,
    pub tesseract_bin: String,
    pub pdftoppm_bin: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_dpi: 200,
            ocr_language: "eng".to_string(),
            tesseract_bin: "tesseract".to_string(),
            pdftoppm_bin: "pdftoppm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub voting: VotingStrategy,
    pub max_words: usize,
    pub max_chunks: usize,
    pub model: String,
    pub model_url: Option<String>,
    #[serde(skip)]
    pub model_token: Option<String>,
    pub model_timeout_secs: u64,
    pub model_concurrency: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            voting: VotingStrategy::Heuristic,
            max_words: 300,
            max_chunks: 10,
            model: "valhalla/distilbart-mnli-12-3".to_string(),
            model_url: None,
            model_token: None,
            model_timeout_secs: 30,
            model_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub model: String,
    pub base_url: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub credentials_path: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub max_input_chars: usize,
    pub chat_excerpt_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            api_key: None,
            project: None,
            location: None,
            credentials_path: None,
            timeout_secs: 60,
            max_attempts: 3,
            max_input_chars: 30_000,
            chat_excerpt_chars: 10_000,
        }
    }
}

impl AppConfig {
    /// Applies process environment on top of the file configuration.
    pub fn apply_env(&mut self) {
        if let Some(port) = env_var("PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }

        self.analysis.api_key = env_var("GEMINI_API_KEY").or_else(|| env_var("GOOGLE_API_KEY"));
        if let Some(model) = env_var("GEMINI_MODEL") {
            self.analysis.model = model;
        }
        if let Some(base) = env_var("GEMINI_BASE_URL") {
            self.analysis.base_url = Some(base);
        }
        if let Some(project) = env_var("GOOGLE_CLOUD_PROJECT") {
            self.analysis.project = Some(project);
        }
        if let Some(location) = env_var("GOOGLE_CLOUD_LOCATION") {
            self.analysis.location = Some(location);
        }
        if let Some(path) = env_var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.analysis.credentials_path = Some(path);
        }

        self.classifier.model_token = env_var("HF_API_TOKEN");
        if let Some(model) = env_var("ZERO_SHOT_MODEL") {
            self.classifier.model = model;
        }
        if let Some(url) = env_var("ZERO_SHOT_URL") {
            self.classifier.model_url = Some(url);
        }
        match env_var("CLASSIFIER_VOTING").as_deref() {
            Some("model") => self.classifier.voting = VotingStrategy::Model,
            Some("heuristic") => self.classifier.voting = VotingStrategy::Heuristic,
            Some(other) => warn!(value = %other, "ignoring unknown CLASSIFIER_VOTING"),
            None => {}
        }
    }
}

pub async fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let mut config = if path.exists() {
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
        info!(path = %path.display(), "Configuration loaded from disk");
        config
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        AppConfig::default()
    };
    config.apply_env();
    Ok(config)
}

fn config_path() -> PathBuf {
    env::var("APP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_section_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "server:\n  port: 9100\nclassifier:\n  voting: model\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.classifier.voting, VotingStrategy::Model);
        assert_eq!(config.classifier.max_words, 300);
        assert_eq!(config.extraction.ocr_dpi, 200);
        assert_eq!(config.analysis.max_input_chars, 30_000);
    }

    #[test]
    fn api_key_is_never_read_from_yaml() {
        let config: AppConfig =
            serde_yaml::from_str("analysis:\n  api_key: leaked\n  model: gemini-pro\n").unwrap();
        assert!(config.analysis.api_key.is_none());
        assert_eq!(config.analysis.model, "gemini-pro");
    }
}
