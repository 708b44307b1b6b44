use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    ai::{
        analysis::{AnalysisOrchestrator, AnalysisProfile, fallback_analysis},
        gemini::{GeminiClient, GenerativeModel},
        schemas::AnalysisResult,
        zero_shot::ModelHandle,
    },
    config::AppConfig,
};

use super::{
    chunker::ChunkConfig,
    classifier::{ClassificationResult, Classifier},
    document_type::{DocumentType, detect_document_type},
    extractor::{DocumentExtractor, DocumentFormat, ExtractedDocument, FormatExtractor},
    ocr::{PdftoppmRasterizer, TesseractOcr},
};

#[derive(Debug, Clone)]
pub enum AnalysisMode {
    /// Deterministic summary, no generative call.
    Basic,
    Enhanced(AnalysisProfile),
}

#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub extraction: ExtractedDocument,
    pub classification: ClassificationResult,
    pub document_type: DocumentType,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Clone)]
pub struct RejectedDocument {
    pub extraction: ExtractedDocument,
    pub classification: ClassificationResult,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Accepted(Box<ProcessedDocument>),
    Rejected(Box<RejectedDocument>),
}

/// Extract, gate, label and analyze one uploaded document.
pub struct Pipeline {
    extractor: Arc<dyn DocumentExtractor>,
    classifier: Classifier,
    orchestrator: AnalysisOrchestrator,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let extractor = Arc::new(FormatExtractor::new(
            Arc::new(TesseractOcr::new(&config.extraction)),
            Arc::new(PdftoppmRasterizer::new(&config.extraction)),
        ));

        let model = match GeminiClient::from_config(&config.analysis)? {
            Some(client) => {
                info!(model = %client.model(), "analysis service configured");
                Some(Arc::new(client) as Arc<dyn GenerativeModel>)
            }
            None => {
                warn!("no GEMINI_API_KEY set, analysis runs in fallback-only mode");
                None
            }
        };

        let classifier = Classifier::new(
            Arc::new(ModelHandle::new(config.classifier.clone())),
            config.classifier.voting,
        )
        .with_chunk_config(ChunkConfig {
            max_words: config.classifier.max_words,
            max_chunks: config.classifier.max_chunks,
        })
        .with_model_concurrency(config.classifier.model_concurrency);

        Ok(Self::with_dependencies(
            extractor,
            classifier,
            AnalysisOrchestrator::new(model, &config.analysis),
        ))
    }

    pub fn with_dependencies(
        extractor: Arc<dyn DocumentExtractor>,
        classifier: Classifier,
        orchestrator: AnalysisOrchestrator,
    ) -> Self {
        Self {
            extractor,
            classifier,
            orchestrator,
        }
    }

    pub fn analysis_available(&self) -> bool {
        self.orchestrator.is_available()
    }

    pub async fn process(
        &self,
        bytes: Arc<[u8]>,
        format: DocumentFormat,
        mode: &AnalysisMode,
    ) -> PipelineOutcome {
        let extraction = self.extractor.extract(bytes, format).await;
        info!(
            method = ?extraction.method,
            chars = extraction.text.chars().count(),
            warnings = ?extraction.warnings,
            "text extracted"
        );

        let classification = self.classifier.classify(&extraction.text).await;
        if !classification.accepted {
            info!(
                reason = ?classification.reject_reason,
                chunks = classification.chunk_count,
                votes = classification.vote_count,
                heuristic = classification.heuristic_score,
                "document rejected"
            );
            return PipelineOutcome::Rejected(Box::new(RejectedDocument {
                extraction,
                classification,
            }));
        }

        let document_type = detect_document_type(&extraction.text);
        let analysis = match mode {
            AnalysisMode::Basic => fallback_analysis(&extraction.text, document_type),
            AnalysisMode::Enhanced(profile) => {
                self.orchestrator
                    .analyze_for(&extraction.text, document_type, profile)
                    .await
            }
        };
        info!(%document_type, source = ?analysis.source, "document analyzed");

        PipelineOutcome::Accepted(Box::new(ProcessedDocument {
            extraction,
            classification,
            document_type,
            analysis,
        }))
    }

    pub async fn chat(&self, document_text: &str, question: &str) -> String {
        self.orchestrator
            .chat_about_document(document_text, question)
            .await
    }
}
