pub mod chunker;
pub mod classifier;
pub mod document_type;
pub mod docx;
pub mod extractor;
pub mod ocr;
pub mod pipeline;

pub use chunker::{Chunk, ChunkConfig, Chunker, WordChunker};
pub use classifier::{ClassificationResult, Classifier, RejectReason, VotingStrategy};
pub use document_type::{DocumentType, detect_document_type};
pub use extractor::{
    DocumentExtractor, DocumentFormat, ExtractedDocument, ExtractionMethod, FormatExtractor,
    SUPPORTED_EXTENSIONS,
};
pub use ocr::{OcrEngine, PageRasterizer, PdftoppmRasterizer, TesseractOcr};
pub use pipeline::{AnalysisMode, Pipeline, PipelineOutcome, ProcessedDocument, RejectedDocument};
