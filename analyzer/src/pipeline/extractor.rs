use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use image::ImageFormat;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{
    docx::extract_docx_text,
    ocr::{OcrEngine, PageRasterizer},
};

pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".png", ".jpg", ".jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Image,
}

impl DocumentFormat {
    /// Format implied by the filename extension, case-insensitive.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lowered = filename.trim().to_ascii_lowercase();
        let ext = SUPPORTED_EXTENSIONS
            .iter()
            .find(|ext| lowered.ends_with(**ext))?;
        match *ext {
            ".pdf" => Some(Self::Pdf),
            ".docx" => Some(Self::Docx),
            _ => Some(Self::Image),
        }
    }

    pub fn mime_hint(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Image => "image/*",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    TextLayer,
    Ocr,
    Docx,
    ImageOcr,
    None,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub raw_bytes: Arc<[u8]>,
    pub mime_hint: &'static str,
    pub text: String,
    pub method: ExtractionMethod,
    pub warnings: Vec<&'static str>,
}

/// Turns uploaded bytes into text. Implementations never fail: problems are
/// logged and reported as warnings next to whatever text could be recovered.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: Arc<[u8]>, format: DocumentFormat) -> ExtractedDocument;
}

#[derive(Clone)]
pub struct FormatExtractor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl FormatExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }

    async fn extract_pdf(
        &self,
        bytes: Arc<[u8]>,
        warnings: &mut Vec<&'static str>,
    ) -> (String, ExtractionMethod) {
        match pdf_text_layer(Arc::clone(&bytes)).await {
            Ok(text) if !text.trim().is_empty() => return (text, ExtractionMethod::TextLayer),
            Ok(_) => {
                info!("pdf text layer is empty, falling back to OCR");
                warnings.push("pdf_text_layer_empty");
            }
            Err(err) => {
                warn!(error = %err, "pdf text extraction failed, falling back to OCR");
                warnings.push("pdf_extract_failed");
            }
        }

        match self.ocr_pdf(&bytes, warnings).await {
            Ok(text) => (text, ExtractionMethod::Ocr),
            Err(err) => {
                warn!(error = %err, "pdf OCR fallback failed");
                warnings.push("pdf_ocr_failed");
                (String::new(), ExtractionMethod::None)
            }
        }
    }

    async fn ocr_pdf(&self, bytes: &[u8], warnings: &mut Vec<&'static str>) -> Result<String> {
        let scratch = TempDir::new().context("failed to create OCR scratch dir")?;
        let pdf_path = scratch.path().join("input.pdf");
        tokio::fs::write(&pdf_path, bytes)
            .await
            .context("failed to stage pdf for rasterization")?;

        let pages = self.rasterizer.rasterize(&pdf_path, scratch.path()).await?;
        debug!(pages = pages.len(), "rasterized pdf for OCR");

        let mut texts = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            match self.ocr.recognize(page).await {
                Ok(text) => texts.push(text),
                Err(err) => {
                    warn!(error = %err, page = index + 1, "OCR failed for page");
                    if !warnings.contains(&"pdf_ocr_page_failed") {
                        warnings.push("pdf_ocr_page_failed");
                    }
                }
            }
        }
        Ok(texts.join("\n"))
    }

    async fn extract_image(&self, bytes: Arc<[u8]>) -> Result<String> {
        let scratch = TempDir::new().context("failed to create OCR scratch dir")?;
        let image_path = scratch.path().join("upload.png");

        let target = image_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let rgb = image::load_from_memory(&bytes)
                .context("failed to decode image")?
                .to_rgb8();
            rgb.save_with_format(&target, ImageFormat::Png)
                .context("failed to write normalized image")
        })
        .await
        .map_err(|err| anyhow!("image decoding panicked: {err}"))??;

        self.ocr.recognize(&image_path).await
    }
}

#[async_trait]
impl DocumentExtractor for FormatExtractor {
    async fn extract(&self, bytes: Arc<[u8]>, format: DocumentFormat) -> ExtractedDocument {
        let mut warnings = Vec::new();

        let (text, method) = match format {
            DocumentFormat::Pdf => self.extract_pdf(Arc::clone(&bytes), &mut warnings).await,
            DocumentFormat::Docx => {
                let archive = Arc::clone(&bytes);
                let parsed = tokio::task::spawn_blocking(move || extract_docx_text(&archive))
                    .await
                    .map_err(|err| anyhow!("docx parsing panicked: {err}"))
                    .and_then(|result| result);
                match parsed {
                    Ok(text) => (text, ExtractionMethod::Docx),
                    Err(err) => {
                        warn!(error = %err, "docx extraction failed");
                        warnings.push("docx_extract_failed");
                        (String::new(), ExtractionMethod::None)
                    }
                }
            }
            DocumentFormat::Image => match self.extract_image(Arc::clone(&bytes)).await {
                Ok(text) => (text, ExtractionMethod::ImageOcr),
                Err(err) => {
                    warn!(error = %err, "image extraction failed");
                    warnings.push("image_ocr_failed");
                    (String::new(), ExtractionMethod::None)
                }
            },
        };

        debug!(
            format = ?format,
            method = ?method,
            chars = text.chars().count(),
            "extraction finished"
        );

        ExtractedDocument {
            raw_bytes: bytes,
            mime_hint: format.mime_hint(),
            text,
            method,
            warnings,
        }
    }
}

/// Text-layer extraction, page by page, dropping blank pages.
async fn pdf_text_layer(bytes: Arc<[u8]>) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|err| anyhow!("pdf-extract: {err}"))?;
        let kept: Vec<String> = pages
            .into_iter()
            .filter(|page| !page.trim().is_empty())
            .collect();
        Ok(kept.join("\n"))
    })
    .await
    .map_err(|err| anyhow!("pdf text extraction panicked: {err}"))?
}
