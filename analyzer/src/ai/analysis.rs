use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::{config::AnalysisConfig, pipeline::document_type::DocumentType};

use super::{
    gemini::GenerativeModel,
    schemas::{AnalysisResult, AnalysisSource, analysis_schema},
};

pub const NOT_ANALYZED: &str = "Not analyzed";
pub const CHAT_FAILURE: &str = "Sorry, I couldn't generate a response. Please try again.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a meticulous legal analyst. You read agreements \
    and explain them to non-lawyers. You answer with a single JSON object and nothing else.";

const CHAT_SYSTEM_PROMPT: &str = "Act as an expert in legal topics and answer questions about \
    the document provided. Base your answer on the document text; say so when the document does \
    not cover the question. Remind the user that you are not a lawyer when giving advice. \
    Keep answers to roughly 150 words.";

/// Who the analysis is written for.
#[derive(Debug, Clone)]
pub struct AnalysisProfile {
    pub user_role: String,
    pub language: String,
}

impl Default for AnalysisProfile {
    fn default() -> Self {
        Self {
            user_role: "individual".to_string(),
            language: "en".to_string(),
        }
    }
}

pub struct AnalysisOrchestrator {
    model: Option<Arc<dyn GenerativeModel>>,
    max_input_chars: usize,
    chat_excerpt_chars: usize,
}

impl AnalysisOrchestrator {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, config: &AnalysisConfig) -> Self {
        Self {
            model,
            max_input_chars: config.max_input_chars,
            chat_excerpt_chars: config.chat_excerpt_chars,
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub async fn analyze(&self, text: &str, document_type: DocumentType) -> AnalysisResult {
        self.analyze_for(text, document_type, &AnalysisProfile::default())
            .await
    }

    pub async fn analyze_for(
        &self,
        text: &str,
        document_type: DocumentType,
        profile: &AnalysisProfile,
    ) -> AnalysisResult {
        let Some(model) = &self.model else {
            info!("analysis service not configured, using fallback analysis");
            return fallback_analysis(text, document_type);
        };

        let prompt = build_analysis_prompt(
            &truncate_chars(text, self.max_input_chars),
            document_type,
            profile,
        );

        let raw = match model.generate(ANALYSIS_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                error!(error = %err, "analysis service call failed");
                return AnalysisResult::failed(format!("AI analysis failed: {err}"));
            }
        };

        let parsed = parse_gemini_response(&raw);
        if parsed.is_empty() {
            warn!(
                response_chars = raw.chars().count(),
                "analysis response held no JSON object, using fallback analysis"
            );
            return fallback_analysis(text, document_type);
        }

        match serde_json::from_value::<AnalysisResult>(Value::Object(parsed)) {
            Ok(mut result) => {
                result.source = AnalysisSource::Model;
                result
            }
            Err(err) => {
                warn!(error = %err, "analysis response did not decode, using fallback analysis");
                fallback_analysis(text, document_type)
            }
        }
    }

    pub async fn chat_about_document(&self, text: &str, question: &str) -> String {
        let Some(model) = &self.model else {
            warn!("chat requested but analysis service is not configured");
            return CHAT_FAILURE.to_string();
        };

        let prompt = format!(
            "Document excerpt:\n\"\"\"\n{}\n\"\"\"\n\nQuestion: {}",
            truncate_chars(text, self.chat_excerpt_chars),
            question.trim()
        );

        match model.generate(CHAT_SYSTEM_PROMPT, &prompt).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                warn!("chat answer was empty");
                CHAT_FAILURE.to_string()
            }
            Err(err) => {
                error!(error = %err, "chat call failed");
                CHAT_FAILURE.to_string()
            }
        }
    }
}

fn build_analysis_prompt(text: &str, document_type: DocumentType, profile: &AnalysisProfile) -> String {
    let schema = serde_json::to_string_pretty(&analysis_schema()).unwrap_or_default();
    format!(
        "Analyze the following {document_type} for a reader whose role is \"{role}\".\n\
         Write every string value in the language with code \"{language}\".\n\
         Return ONLY a JSON object that matches this JSON schema, with no prose and no code fences:\n\
         {schema}\n\n\
         Document:\n\"\"\"\n{text}\n\"\"\"",
        role = profile.user_role,
        language = profile.language,
    )
}

/// Deterministic analysis used when the service is missing or its answer is unusable.
pub fn fallback_analysis(text: &str, _document_type: DocumentType) -> AnalysisResult {
    let sentences: Vec<&str> = text.split('.').collect();
    let summary = if sentences.len() > 3 {
        format!("{}.", sentences[..3].join(". "))
    } else {
        truncate_chars(text, 500)
    };

    AnalysisResult {
        summary,
        jurisdiction: NOT_ANALYZED.to_string(),
        recommendations: vec!["Have a legal professional review this document".to_string()],
        next_steps: vec!["Review document with legal counsel".to_string()],
        source: AnalysisSource::Fallback,
        ..AnalysisResult::default()
    }
}

/// Recovers the JSON object from a model answer that may be wrapped in prose or
/// code fences. Anything unrecoverable yields an empty map.
pub fn parse_gemini_response(raw: &str) -> Map<String, Value> {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Map::new();
    };
    if start > end {
        return Map::new();
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw[start..=end]) {
        return map;
    }

    balanced_object(&raw[start..])
        .and_then(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

/// The first `{...}` span with balanced braces, ignoring braces inside strings.
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in s.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
