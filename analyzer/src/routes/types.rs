use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ai::schemas::AnalysisResult,
    pipeline::{classifier::ClassificationResult, document_type::DocumentType},
};

pub const REJECTED_MESSAGE: &str = "Rejected: Not a valid agreement.";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub document_type: DocumentType,
    pub extracted_text: String,
    pub analysis: AnalysisResult,
    pub classification: ClassificationResult,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ClassificationResult>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, reason: &'static str) -> Self {
        Self {
            error: error.into(),
            reason,
            details: None,
        }
    }

    pub fn rejected(classification: ClassificationResult) -> Self {
        Self {
            error: REJECTED_MESSAGE.to_string(),
            reason: classification
                .reject_reason
                .map(|reason| reason.as_str())
                .unwrap_or("low_confidence"),
            details: Some(classification),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub document_text: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportForm {
    #[serde(default)]
    pub text: String,
}
