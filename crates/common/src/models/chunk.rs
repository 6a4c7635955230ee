//! Ingestion chunks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of content a chunk carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
    Image,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Table => "table",
            ChunkType::Image => "image",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_page_number() -> u32 {
    1
}

/// Metadata stored alongside every embedding
///
/// Serialized flat (no nulls) so it can be handed to any vector store as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Chunk kind, used at query time to split text from image evidence
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,

    /// Path of the ingested file
    pub source: String,

    /// Base name of `source`
    pub filename: String,

    /// 1-based page number
    #[serde(default = "default_page_number")]
    pub page_number: u32,

    /// Image file backing an image chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

impl ChunkMetadata {
    /// Metadata for a chunk taken from `source` at the given page
    pub fn for_file(chunk_type: ChunkType, source: &Path, page_number: u32) -> Self {
        let filename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        Self {
            chunk_type,
            source: source.display().to_string(),
            filename,
            page_number: page_number.max(1),
            image_path: None,
            ingested_at: None,
        }
    }

    pub fn with_image_path(mut self, image_path: &Path) -> Self {
        self.image_path = Some(image_path.display().to_string());
        self
    }

    pub fn is_image(&self) -> bool {
        self.chunk_type == ChunkType::Image
    }
}

/// A piece of extracted content, immutable once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text, table HTML, or OCR text / placeholder for images
    pub content: String,

    /// Plain-text rendering of a table, preferred for embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_summary: Option<String>,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn text(content: impl Into<String>, source: &Path, page_number: u32) -> Self {
        Self {
            content: content.into(),
            text_summary: None,
            metadata: ChunkMetadata::for_file(ChunkType::Text, source, page_number),
        }
    }

    pub fn table(
        html: impl Into<String>,
        text_summary: Option<String>,
        source: &Path,
        page_number: u32,
    ) -> Self {
        Self {
            content: html.into(),
            text_summary,
            metadata: ChunkMetadata::for_file(ChunkType::Table, source, page_number),
        }
    }

    pub fn image(
        content: impl Into<String>,
        image_path: &Path,
        source: &Path,
        page_number: u32,
    ) -> Self {
        Self {
            content: content.into(),
            text_summary: None,
            metadata: ChunkMetadata::for_file(ChunkType::Image, source, page_number)
                .with_image_path(image_path),
        }
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.metadata.chunk_type
    }

    /// Text handed to the text embedder
    pub fn embedding_text(&self) -> &str {
        match &self.text_summary {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => &self.content,
        }
    }

    /// Text stored as the record's document
    ///
    /// Images with no OCR text fall back to a placeholder naming the file.
    pub fn document_text(&self) -> String {
        if self.chunk_type() == ChunkType::Image && self.content.trim().is_empty() {
            format!("Image content from {}", self.metadata.filename)
        } else {
            self.content.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_for_file() {
        let meta = ChunkMetadata::for_file(
            ChunkType::Text,
            Path::new("sample_documents/doc_0_AI_Trends.pdf"),
            3,
        );
        assert_eq!(meta.filename, "doc_0_AI_Trends.pdf");
        assert_eq!(meta.source, "sample_documents/doc_0_AI_Trends.pdf");
        assert_eq!(meta.page_number, 3);
        assert!(meta.image_path.is_none());
    }

    #[test]
    fn test_page_number_is_one_based() {
        let meta = ChunkMetadata::for_file(ChunkType::Text, Path::new("a.pdf"), 0);
        assert_eq!(meta.page_number, 1);
    }

    #[test]
    fn test_metadata_serializes_flat_without_nulls() {
        let chunk = Chunk::text("hello", Path::new("docs/a.pdf"), 2);
        let value = serde_json::to_value(&chunk.metadata).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "text",
                "source": "docs/a.pdf",
                "filename": "a.pdf",
                "page_number": 2,
            })
        );
    }

    #[test]
    fn test_missing_page_number_defaults() {
        let meta: ChunkMetadata = serde_json::from_value(serde_json::json!({
            "type": "image",
            "source": "x.png",
            "filename": "x.png",
            "image_path": "x.png",
        }))
        .unwrap();
        assert_eq!(meta.page_number, 1);
        assert!(meta.is_image());
    }

    #[test]
    fn test_table_embeds_summary() {
        let chunk = Chunk::table(
            "<table><tr><td>42</td></tr></table>",
            Some("42".to_string()),
            Path::new("t.pdf"),
            1,
        );
        assert_eq!(chunk.embedding_text(), "42");
        assert_eq!(chunk.document_text(), "<table><tr><td>42</td></tr></table>");
    }

    #[test]
    fn test_image_document_placeholder() {
        let img = Path::new("sample_documents/standalone_diagram_0.jpg");
        let blank = Chunk::image("  \n", img, img, 1);
        assert_eq!(blank.document_text(), "Image content from standalone_diagram_0.jpg");

        let ocr = Chunk::image("Q3 revenue", img, img, 1);
        assert_eq!(ocr.document_text(), "Q3 revenue");
        assert_eq!(
            ocr.metadata.image_path.as_deref(),
            Some("sample_documents/standalone_diagram_0.jpg")
        );
    }
}
