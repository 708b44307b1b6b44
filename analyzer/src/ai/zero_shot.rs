use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::{sync::OnceCell, time::Duration};
use tracing::{info, warn};

use crate::config::ClassifierConfig;

pub const HYPOTHESIS_TEMPLATE: &str = "This text is about {}.";

#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// Highest multi-label confidence among `labels`, in `[0, 1]`.
    async fn max_label_score(&self, text: &str, labels: &[&str]) -> Result<f64>;
}

/// Zero-shot classification served by a Hugging Face style inference endpoint.
pub struct InferenceApiClassifier {
    http: Client,
    url: String,
    token: Option<String>,
}

impl InferenceApiClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let url = match &config.model_url {
            Some(url) => url.clone(),
            None => {
                let token = config.model_token.as_deref().unwrap_or_default();
                if token.is_empty() {
                    bail!("no HF_API_TOKEN or ZERO_SHOT_URL configured");
                }
                format!(
                    "https://api-inference.huggingface.co/models/{}",
                    config.model
                )
            }
        };

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.model_timeout_secs))
            .build()
            .context("failed to build zero-shot http client")?;

        Ok(Self {
            http,
            url,
            token: config.model_token.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Single(LabelScores),
    Batch(Vec<LabelScores>),
}

#[derive(Debug, Deserialize)]
struct LabelScores {
    #[serde(default)]
    scores: Vec<f64>,
}

#[async_trait]
impl ZeroShotClassifier for InferenceApiClassifier {
    async fn max_label_score(&self, text: &str, labels: &[&str]) -> Result<f64> {
        let body = json!({
            "inputs": text,
            "parameters": {
                "candidate_labels": labels,
                "multi_label": true,
                "hypothesis_template": HYPOTHESIS_TEMPLATE,
            }
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.context("zero-shot request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let err_txt = resp.text().await.unwrap_or_default();
            bail!("zero-shot endpoint error {}: {}", status, err_txt);
        }

        let parsed: InferenceResponse = resp
            .json()
            .await
            .context("zero-shot response was not the expected shape")?;
        let scores = match parsed {
            InferenceResponse::Single(scores) => scores.scores,
            InferenceResponse::Batch(batch) => batch
                .into_iter()
                .next()
                .map(|scores| scores.scores)
                .unwrap_or_default(),
        };

        scores
            .into_iter()
            .reduce(f64::max)
            .map(|score| score.clamp(0.0, 1.0))
            .ok_or_else(|| anyhow!("zero-shot response had no scores"))
    }
}

/// Process-wide handle to the optional zero-shot model. The client is built on
/// first use and reused afterwards; a failed build is remembered as unavailable.
pub struct ModelHandle {
    config: Option<ClassifierConfig>,
    cell: OnceCell<Option<Arc<dyn ZeroShotClassifier>>>,
}

impl ModelHandle {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config: Some(config),
            cell: OnceCell::new(),
        }
    }

    pub fn with_classifier(classifier: Arc<dyn ZeroShotClassifier>) -> Self {
        Self {
            config: None,
            cell: OnceCell::new_with(Some(Some(classifier))),
        }
    }

    pub fn disabled() -> Self {
        Self {
            config: None,
            cell: OnceCell::new_with(Some(None)),
        }
    }

    pub async fn get(&self) -> Option<Arc<dyn ZeroShotClassifier>> {
        self.cell
            .get_or_init(|| async {
                let config = self.config.as_ref()?;
                match InferenceApiClassifier::new(config) {
                    Ok(classifier) => {
                        info!(model = %config.model, "zero-shot model ready");
                        Some(Arc::new(classifier) as Arc<dyn ZeroShotClassifier>)
                    }
                    Err(err) => {
                        warn!(error = %err, "zero-shot model unavailable");
                        None
                    }
                }
            })
            .await
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_model_is_unavailable_and_cached() {
        let handle = ModelHandle::new(ClassifierConfig::default());
        assert!(handle.get().await.is_none());
        assert!(handle.get().await.is_none());
    }

    #[tokio::test]
    async fn explicit_url_builds_a_client() {
        let config = ClassifierConfig {
            model_url: Some("http://127.0.0.1:9/zero-shot".to_string()),
            ..ClassifierConfig::default()
        };
        let handle = ModelHandle::new(config);
        let first = handle.get().await.expect("client");
        let second = handle.get().await.expect("client");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn both_response_shapes_decode() {
        let single: InferenceResponse =
            serde_json::from_str(r#"{"sequence":"x","labels":["a","b"],"scores":[0.2,0.7]}"#)
                .unwrap();
        assert!(matches!(single, InferenceResponse::Single(ref s) if s.scores == vec![0.2, 0.7]));

        let batch: InferenceResponse =
            serde_json::from_str(r#"[{"labels":["a"],"scores":[0.4]}]"#).unwrap();
        assert!(matches!(batch, InferenceResponse::Batch(ref b) if b.len() == 1));
    }
}
