use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Output,
};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ExtractionConfig;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_path: &Path) -> Result<String>;
}

/// Renders every page of a PDF to an image file, returned in page order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    bin: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            bin: config.tesseract_bin.clone(),
            language: config.ocr_language.clone(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image_path: &Path) -> Result<String> {
        let output = run(
            Command::new(&self.bin)
                .arg(image_path)
                .arg("stdout")
                .arg("-l")
                .arg(&self.language),
            &self.bin,
        )
        .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    bin: String,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            bin: config.pdftoppm_bin.clone(),
            dpi: config.ocr_dpi,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let prefix = out_dir.join("page");
        run(
            Command::new(&self.bin)
                .arg("-r")
                .arg(self.dpi.to_string())
                .arg("-png")
                .arg(pdf_path)
                .arg(&prefix),
            &self.bin,
        )
        .await?;

        let mut entries = tokio::fs::read_dir(out_dir)
            .await
            .with_context(|| format!("failed to list {}", out_dir.display()))?;
        let mut pages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(number) = page_number(&path) {
                pages.push((number, path));
            }
        }

        if pages.is_empty() {
            bail!("{} produced no page images", self.bin);
        }
        pages.sort_by_key(|(number, _)| *number);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }
}

/// `page-7.png` and `page-007.png` both map to 7.
fn page_number(path: &Path) -> Option<u32> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("png") {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix("page-")?
        .parse()
        .ok()
}

async fn run(command: &mut Command, bin: &str) -> Result<Output> {
    let output = command.kill_on_drop(true).output().await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            anyhow!("{bin} is not installed")
        } else {
            anyhow!("failed to spawn {bin}: {err}")
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{bin} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_ignore_padding_and_other_files() {
        assert_eq!(page_number(Path::new("/tmp/x/page-3.png")), Some(3));
        assert_eq!(page_number(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(page_number(Path::new("/tmp/x/page-1.ppm")), None);
        assert_eq!(page_number(Path::new("/tmp/x/input.pdf")), None);
    }

    #[tokio::test]
    async fn missing_binary_is_an_error_not_a_panic() {
        let config = ExtractionConfig {
            tesseract_bin: "definitely-not-a-real-ocr-binary".to_string(),
            ..ExtractionConfig::default()
        };
        let err = TesseractOcr::new(&config)
            .recognize(Path::new("/nonexistent.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
