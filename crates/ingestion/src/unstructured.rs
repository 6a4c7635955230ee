//! Client for the Unstructured partitioning API
//!
//! PDFs are posted with the `hi_res` strategy, table structure inference,
//! image block extraction and `by_title` chunking. Returned elements become
//! text, table or image chunks; image blocks arrive base64-encoded and are
//! written to the image output directory.

use crate::errors::IngestionError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use prism_common::config::PartitionerConfig;
use prism_common::Chunk;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

const PARTITION_PATH: &str = "/general/v0/general";

/// Placeholder content for image blocks cut out of a page
pub const EXTRACTED_IMAGE_CONTENT: &str = "Image extracted from page.";

/// A document element as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementMetadata {
    pub page_number: Option<u32>,
    pub text_as_html: Option<String>,
    pub image_base64: Option<String>,
    pub image_mime_type: Option<String>,
}

/// HTTP client for `POST /general/v0/general`
pub struct UnstructuredClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    strategy: String,
    max_characters: usize,
    new_after_n_chars: usize,
    combine_under_n_chars: usize,
}

impl UnstructuredClient {
    pub fn new(config: &PartitionerConfig) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| IngestionError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.api_base.trim_end_matches('/'), PARTITION_PATH),
            api_key: config.api_key.clone(),
            strategy: config.strategy.clone(),
            max_characters: config.max_characters,
            new_after_n_chars: config.new_after_n_chars,
            combine_under_n_chars: config.combine_under_n_chars,
        })
    }

    /// Partition a PDF into elements
    pub async fn partition(&self, path: &Path) -> Result<Vec<Element>, IngestionError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let file_part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")
            .map_err(|e| IngestionError::partition(path, e.to_string()))?;

        let form = Form::new()
            .part("files", file_part)
            .text("strategy", self.strategy.clone())
            .text("pdf_infer_table_structure", "true")
            .text("extract_image_block_types", "[\"Image\"]")
            .text("chunking_strategy", "by_title")
            .text("max_characters", self.max_characters.to_string())
            .text("new_after_n_chars", self.new_after_n_chars.to_string())
            .text("combine_under_n_chars", self.combine_under_n_chars.to_string());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.header("unstructured-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IngestionError::partition(path, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestionError::partition(path, format!("API error {}: {}", status, body)));
        }

        let elements: Vec<Element> = response
            .json()
            .await
            .map_err(|e| IngestionError::partition(path, format!("Invalid response: {}", e)))?;

        info!(elements = elements.len(), "PDF partitioned");
        Ok(elements)
    }
}

/// Convert partitioned elements into chunks
///
/// Image blocks are decoded and saved as `{stem}-page{n}-{idx}.{ext}` under
/// `image_dir`. Image elements without a payload and blank text elements are
/// dropped.
pub async fn elements_to_chunks(
    elements: Vec<Element>,
    source: &Path,
    image_dir: &Path,
) -> Result<Vec<Chunk>, IngestionError> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let mut chunks = Vec::with_capacity(elements.len());
    let mut image_index = 0usize;

    for element in elements {
        let page = element.metadata.page_number.unwrap_or(1);

        match element.element_type.as_str() {
            "Table" | "TableChunk" => {
                let summary = (!element.text.trim().is_empty()).then(|| element.text.clone());
                let html = element
                    .metadata
                    .text_as_html
                    .filter(|html| !html.trim().is_empty())
                    .unwrap_or(element.text);
                if html.trim().is_empty() {
                    continue;
                }
                chunks.push(Chunk::table(html, summary, source, page));
            }
            "Image" => {
                let Some(encoded) = element.metadata.image_base64.as_deref() else {
                    warn!(page, "Image element without payload, skipping");
                    continue;
                };
                let bytes = match BASE64.decode(encoded.trim()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(page, error = %e, "Undecodable image payload, skipping");
                        continue;
                    }
                };

                let ext = image_extension(element.metadata.image_mime_type.as_deref());
                let image_path = image_dir.join(format!("{}-page{}-{}.{}", stem, page, image_index, ext));
                image_index += 1;

                tokio::fs::write(&image_path, bytes).await?;
                debug!(path = %image_path.display(), "Extracted image saved");

                chunks.push(Chunk::image(EXTRACTED_IMAGE_CONTENT, &image_path, source, page));
            }
            _ => {
                if element.text.trim().is_empty() {
                    continue;
                }
                chunks.push(Chunk::text(element.text, source, page));
            }
        }
    }

    Ok(chunks)
}

/// File extension for an image MIME type, defaulting to JPEG
fn image_extension(mime: Option<&str>) -> &'static str {
    match mime {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => "jpg",
    }
}
