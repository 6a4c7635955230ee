//! OCR for standalone images via the `tesseract` CLI

use crate::errors::IngestionError;
use prism_common::config::OcrConfig;
use prism_common::Chunk;
use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, warn};

static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

/// Runs OCR on standalone images
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    tesseract_cmd: String,
    language: String,
}

impl ImageProcessor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            tesseract_cmd: config.tesseract_cmd.clone(),
            language: config.language.clone(),
        }
    }

    /// OCR an image into a single page-1 image chunk
    ///
    /// Never fails: a missing file or an OCR error is logged and yields `None`.
    pub async fn process_image(&self, path: &Path) -> Option<Chunk> {
        match self.extract_text(path).await {
            Ok(text) => {
                debug!(path = %path.display(), chars = text.len(), "OCR complete");
                Some(Chunk::image(text, path, path, 1))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error processing image");
                None
            }
        }
    }

    async fn extract_text(&self, path: &Path) -> Result<String, IngestionError> {
        if !path.is_file() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let output = Command::new(&self.tesseract_cmd)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| IngestionError::OcrError {
                path: path.display().to_string(),
                message: format!("Failed to run {}: {}", self.tesseract_cmd, e),
            })?;

        if !output.status.success() {
            return Err(IngestionError::OcrError {
                path: path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(normalize_ocr_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Trim and collapse runs of blank lines left by the OCR engine
fn normalize_ocr_text(raw: &str) -> String {
    let blank_lines = BLANK_LINES
        .get_or_init(|| Regex::new(r"\n[ \t\f]*(\n[ \t\f]*)+").expect("static pattern"));
    blank_lines.replace_all(raw.trim(), "\n\n").into_owned()
}
