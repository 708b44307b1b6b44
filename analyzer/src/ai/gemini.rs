use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;

const DEFAULT_BASE: &str = "https://generativelanguage.googleapis.com";

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Raw text of the model's answer.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    http: Client,
    api_key: String,
    base: String,
    model: String,
    project: Option<String>,
    max_attempts: u32,
}

impl GeminiClient {
    /// `Ok(None)` when no API key is configured.
    pub fn from_config(config: &AnalysisConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build gemini http client")?;

        Ok(Some(Self {
            http,
            api_key,
            base: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE.into()),
            model: config.model.clone(),
            project: config.project.clone(),
            max_attempts: config.max_attempts.max(1),
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json(&self, body: &GenerateRequest<'_>) -> reqwest::Result<reqwest::Response> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base.trim_end_matches('/'),
            self.model
        );
        let mut request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body);
        if let Some(project) = &self.project {
            request = request.header("x-goog-user-project", project);
        }
        request.send().await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Concatenates `candidates[0].content.parts[*].text`.
fn candidate_text(root: &Value) -> String {
    root.get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 8192,
            },
        };

        let mut delay = Duration::from_millis(300);
        for attempt in 1..=self.max_attempts {
            let resp = self
                .post_json(&body)
                .await
                .context("Network error calling Gemini")?;
            if resp.status().is_success() {
                let v: Value = resp
                    .json()
                    .await
                    .context("Gemini returned a non-JSON body")?;
                let text = candidate_text(&v);
                if text.is_empty() {
                    warn!(model = %self.model, "Gemini response carried no candidate text");
                }
                return Ok(text);
            }

            let status = resp.status();
            if (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                && attempt < self.max_attempts
            {
                debug!(%status, attempt, "retrying Gemini request");
                sleep(delay).await;
                delay = Duration::from_millis((delay.as_millis() as f64 * 1.8) as u64)
                    + Duration::from_millis(fastrand::u64(0..250));
                continue;
            }

            let err_txt = resp.text().await.unwrap_or_default();
            bail!("Gemini error {}: {}", status, err_txt);
        }
        bail!("Retries exhausted")
    }
}
