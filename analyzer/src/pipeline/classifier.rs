use std::sync::Arc;

use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::ai::zero_shot::ModelHandle;

use super::chunker::{Chunk, ChunkConfig, Chunker, WordChunker};

/// Section headings and terms that show up in agreements of every flavour we accept.
pub const SECTION_CUES: [&str; 23] = [
    "agreement",
    "security deposit",
    "rental period",
    "payment terms",
    "termination",
    "arbitration",
    "jurisdiction",
    "witness",
    "signatory",
    "governing law",
    "parties",
    "definitions",
    "probation period",
    "internship duration",
    "performance",
    "salary",
    "compensation",
    "notice period",
    "work expectations",
    "attendance",
    "leaves",
    "certificate",
    "offer letter",
];

/// Candidate labels handed to the zero-shot model.
pub const POSITIVE_LABELS: [&str; 13] = [
    "agreement",
    "legal contract",
    "rental agreement",
    "lease agreement",
    "service agreement",
    "tenant-landlord agreement",
    "terms and conditions",
    "offer letter",
    "internship agreement",
    "employment contract",
    "student agreement",
    "job offer",
    "internship terms",
];

pub const CHUNK_THRESHOLD: f64 = 0.5;
pub const ACCEPT_THRESHOLD: f64 = 0.4;

static CUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    SECTION_CUES
        .iter()
        .map(|cue| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(cue)))
                .expect("section cue pattern is valid")
        })
        .collect()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Chunks vote with the same cue-density score used for the whole document.
    #[default]
    Heuristic,
    /// Chunks vote with the zero-shot model's best label confidence.
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    EmptyText,
    LowConfidence,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyText => "empty_text",
            Self::LowConfidence => "low_confidence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub accepted: bool,
    #[serde(rename = "chunks")]
    pub chunk_count: usize,
    #[serde(rename = "votes")]
    pub vote_count: usize,
    #[serde(serialize_with = "round3")]
    pub vote_ratio: f64,
    #[serde(rename = "heuristic", serialize_with = "round3")]
    pub heuristic_score: f64,
    #[serde(serialize_with = "round3")]
    pub avg_chunk_score: f64,
    pub total_words: usize,
    pub voting: VotingStrategy,
    #[serde(rename = "reason", skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

impl ClassificationResult {
    fn empty(voting: VotingStrategy) -> Self {
        Self {
            accepted: false,
            chunk_count: 0,
            vote_count: 0,
            vote_ratio: 0.0,
            heuristic_score: 0.0,
            avg_chunk_score: 0.0,
            total_words: 0,
            voting,
            reject_reason: Some(RejectReason::EmptyText),
        }
    }
}

fn round3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 1000.0).round() / 1000.0)
}

/// Fraction of [`SECTION_CUES`] present in `text` as whole words, case-insensitive.
pub fn heuristic_score(text: &str) -> f64 {
    let found = CUE_PATTERNS
        .iter()
        .filter(|pattern| pattern.is_match(text))
        .count();
    found as f64 / SECTION_CUES.len().max(1) as f64
}

/// Dual gate: enough voting chunks, or enough cue density overall.
pub fn is_accepted(vote_ratio: f64, heuristic: f64) -> bool {
    vote_ratio >= ACCEPT_THRESHOLD || heuristic >= ACCEPT_THRESHOLD
}

pub struct Classifier {
    chunker: Arc<dyn Chunker>,
    chunk_config: ChunkConfig,
    voting: VotingStrategy,
    model: Arc<ModelHandle>,
    model_concurrency: usize,
}

impl Classifier {
    pub fn new(model: Arc<ModelHandle>, voting: VotingStrategy) -> Self {
        Self {
            chunker: Arc::new(WordChunker),
            chunk_config: ChunkConfig::default(),
            voting,
            model,
            model_concurrency: 4,
        }
    }

    pub fn with_chunk_config(mut self, chunk_config: ChunkConfig) -> Self {
        self.chunk_config = chunk_config;
        self
    }

    pub fn with_model_concurrency(mut self, concurrency: usize) -> Self {
        self.model_concurrency = concurrency.max(1);
        self
    }

    pub fn voting(&self) -> VotingStrategy {
        self.voting
    }

    pub async fn classify(&self, text: &str) -> ClassificationResult {
        if text.trim().is_empty() {
            return ClassificationResult::empty(self.voting);
        }

        let chunks = self.chunker.chunk(text, &self.chunk_config);
        if chunks.is_empty() {
            return ClassificationResult::empty(self.voting);
        }

        let scores: Vec<f64> = match self.voting {
            VotingStrategy::Heuristic => chunks
                .iter()
                .map(|chunk| heuristic_score(&chunk.text()))
                .collect(),
            VotingStrategy::Model => self.model_scores(&chunks).await,
        };

        let chunk_count = chunks.len();
        let vote_count = scores
            .iter()
            .filter(|score| **score >= CHUNK_THRESHOLD)
            .count();
        let vote_ratio = vote_count as f64 / chunk_count as f64;
        let heuristic = heuristic_score(text);
        let avg_chunk_score = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
        let accepted = is_accepted(vote_ratio, heuristic);

        debug!(
            chunks = chunk_count,
            votes = vote_count,
            vote_ratio,
            heuristic,
            accepted,
            "classified document"
        );

        ClassificationResult {
            accepted,
            chunk_count,
            vote_count,
            vote_ratio,
            heuristic_score: heuristic,
            avg_chunk_score,
            total_words: text.split_whitespace().count(),
            voting: self.voting,
            reject_reason: (!accepted).then_some(RejectReason::LowConfidence),
        }
    }

    async fn model_scores(&self, chunks: &[Chunk]) -> Vec<f64> {
        let Some(model) = self.model.get().await else {
            warn!("zero-shot model unavailable, chunk votes fall back to zero");
            return vec![0.0; chunks.len()];
        };

        let texts: Vec<(usize, String)> = chunks
            .iter()
            .map(|chunk| (chunk.ordinal, chunk.text()))
            .collect();

        stream::iter(texts)
            .map(|(ordinal, text)| {
                let model = Arc::clone(&model);
                async move {
                    match model.max_label_score(&text, &POSITIVE_LABELS).await {
                        Ok(score) => score,
                        Err(err) => {
                            warn!(error = %err, ordinal, "zero-shot scoring failed");
                            0.0
                        }
                    }
                }
            })
            .buffered(self.model_concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::zero_shot::ZeroShotClassifier;
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    const LEASE: &str = "This Agreement is made between the parties named below. \
        Definitions apply throughout. The rental period is twelve months and the security deposit \
        is due at signing. Payment terms: rent is due monthly. Termination requires notice. \
        Disputes go to arbitration under the jurisdiction and governing law of the state. \
        Signed before a witness by each signatory.";

    struct FixedScore(f64);

    #[async_trait]
    impl ZeroShotClassifier for FixedScore {
        async fn max_label_score(&self, _text: &str, _labels: &[&str]) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct Broken;

    #[async_trait]
    impl ZeroShotClassifier for Broken {
        async fn max_label_score(&self, _text: &str, _labels: &[&str]) -> Result<f64> {
            bail!("inference endpoint returned 503")
        }
    }

    fn heuristic_classifier() -> Classifier {
        Classifier::new(Arc::new(ModelHandle::disabled()), VotingStrategy::Heuristic)
    }

    #[test]
    fn cues_match_whole_words_only() {
        assert_eq!(heuristic_score("agreements and disagreement"), 0.0);
        let one = 1.0 / SECTION_CUES.len() as f64;
        assert!((heuristic_score("The AGREEMENT.") - one).abs() < 1e-9);
        assert!((heuristic_score("governing law; Governing Law") - one).abs() < 1e-9);
    }

    #[test]
    fn acceptance_is_monotonic() {
        let grid = [0.0, 0.1, 0.39, 0.4, 0.41, 0.75, 1.0];
        for &ratio in &grid {
            for &heur in &grid {
                if is_accepted(ratio, heur) {
                    for &higher in grid.iter().filter(|v| **v >= ratio) {
                        assert!(is_accepted(higher, heur));
                    }
                    for &higher in grid.iter().filter(|v| **v >= heur) {
                        assert!(is_accepted(ratio, higher));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected_as_empty() {
        let result = heuristic_classifier().classify("  \n\t ").await;
        assert!(!result.accepted);
        assert_eq!(result.reject_reason, Some(RejectReason::EmptyText));
        assert_eq!(result.chunk_count, 0);
        assert_eq!(result.vote_count, 0);
        assert_eq!(result.vote_ratio, 0.0);
    }

    #[tokio::test]
    async fn lease_is_accepted_on_heuristic_alone() {
        let result = heuristic_classifier().classify(LEASE).await;
        assert!(result.heuristic_score >= ACCEPT_THRESHOLD);
        assert!(result.accepted);
        assert_eq!(result.reject_reason, None);
        assert_eq!(result.chunk_count, 1);
    }

    #[tokio::test]
    async fn prose_is_rejected_with_low_confidence() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(80);
        let result = heuristic_classifier().classify(&text).await;
        assert!(!result.accepted);
        assert_eq!(result.reject_reason, Some(RejectReason::LowConfidence));
        assert_eq!(result.chunk_count, 3);
        assert_eq!(result.vote_ratio, 0.0);
    }

    #[tokio::test]
    async fn long_input_reports_evaluated_chunks() {
        let text = "word ".repeat(5_000);
        let result = heuristic_classifier().classify(&text).await;
        assert_eq!(result.chunk_count, 10);
        assert_eq!(result.total_words, 5_000);
        assert!((0.0..=1.0).contains(&result.vote_ratio));
    }

    #[tokio::test]
    async fn zero_max_chunks_still_classifies_text() {
        let classifier = heuristic_classifier().with_chunk_config(ChunkConfig {
            max_words: 300,
            max_chunks: 0,
        });
        let result = classifier.classify(LEASE).await;
        assert_eq!(result.chunk_count, 1);
        assert_ne!(result.reject_reason, Some(RejectReason::EmptyText));
        assert!(result.accepted);
    }

    #[tokio::test]
    async fn model_votes_drive_the_ratio() {
        let handle = ModelHandle::with_classifier(Arc::new(FixedScore(0.9)));
        let classifier = Classifier::new(Arc::new(handle), VotingStrategy::Model);
        let text = "plain words without any cues ".repeat(150);
        let result = classifier.classify(&text).await;
        assert_eq!(result.chunk_count, 3);
        assert_eq!(result.vote_count, 3);
        assert_eq!(result.vote_ratio, 1.0);
        assert!((result.avg_chunk_score - 0.9).abs() < 1e-9);
        assert!(result.accepted);
    }

    #[tokio::test]
    async fn model_failure_scores_zero_but_heuristic_gate_still_accepts() {
        let handle = ModelHandle::with_classifier(Arc::new(Broken));
        let classifier = Classifier::new(Arc::new(handle), VotingStrategy::Model);
        let result = classifier.classify(LEASE).await;
        assert_eq!(result.vote_count, 0);
        assert_eq!(result.avg_chunk_score, 0.0);
        assert!(result.accepted);
    }

    #[tokio::test]
    async fn unavailable_model_counts_as_zero_votes() {
        let classifier = Classifier::new(Arc::new(ModelHandle::disabled()), VotingStrategy::Model);
        let result = classifier.classify("nothing legal here at all").await;
        assert_eq!(result.vote_count, 0);
        assert!(!result.accepted);
    }

    #[test]
    fn diagnostics_serialize_rounded() {
        let result = ClassificationResult {
            accepted: false,
            chunk_count: 3,
            vote_count: 1,
            vote_ratio: 1.0 / 3.0,
            heuristic_score: 0.2,
            avg_chunk_score: 0.123456,
            total_words: 700,
            voting: VotingStrategy::Heuristic,
            reject_reason: Some(RejectReason::LowConfidence),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["vote_ratio"], 0.333);
        assert_eq!(value["avg_chunk_score"], 0.123);
        assert_eq!(value["chunks"], 3);
        assert_eq!(value["reason"], "low_confidence");
        assert_eq!(value["voting"], "heuristic");
    }
}
