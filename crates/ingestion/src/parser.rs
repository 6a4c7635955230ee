//! PDF parsing into text, table and image chunks

use crate::chunker::chunk_text;
use crate::errors::IngestionError;
use crate::pdf::extract_pages_from_pdf;
use crate::unstructured::{elements_to_chunks, UnstructuredClient};
use prism_common::config::PartitionerConfig;
use prism_common::Chunk;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// How PDFs are partitioned
pub enum PartitionBackend {
    /// Unstructured API: text, tables and images
    Unstructured(UnstructuredClient),
    /// Local lopdf text extraction, split at `max_characters`
    Local { max_characters: usize },
}

/// Splits PDFs into chunks and stores extracted images
pub struct DocumentParser {
    image_output_dir: PathBuf,
    backend: PartitionBackend,
}

impl DocumentParser {
    /// Create a parser, creating `image_output_dir` if needed
    pub fn new(
        image_output_dir: impl Into<PathBuf>,
        backend: PartitionBackend,
    ) -> Result<Self, IngestionError> {
        let image_output_dir = image_output_dir.into();
        std::fs::create_dir_all(&image_output_dir)?;
        Ok(Self {
            image_output_dir,
            backend,
        })
    }

    pub fn from_config(config: &PartitionerConfig) -> Result<Self, IngestionError> {
        let backend = match config.provider.as_str() {
            "unstructured" => PartitionBackend::Unstructured(UnstructuredClient::new(config)?),
            "lopdf" => PartitionBackend::Local {
                max_characters: config.max_characters,
            },
            other => {
                return Err(IngestionError::ConfigError(format!(
                    "Unknown partitioner provider: {}",
                    other
                )))
            }
        };
        Self::new(&config.image_output_dir, backend)
    }

    pub fn image_output_dir(&self) -> &Path {
        &self.image_output_dir
    }

    /// Parse a PDF into chunks carrying source, filename and page metadata
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn parse_pdf(&self, path: &Path) -> Result<Vec<Chunk>, IngestionError> {
        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let chunks = match &self.backend {
            PartitionBackend::Unstructured(client) => {
                let elements = client.partition(path).await?;
                elements_to_chunks(elements, path, &self.image_output_dir).await?
            }
            PartitionBackend::Local { max_characters } => {
                let owned = path.to_path_buf();
                let pages = tokio::task::spawn_blocking(move || extract_pages_from_pdf(&owned))
                    .await
                    .map_err(|e| IngestionError::partition(path, format!("Extraction task failed: {}", e)))??;

                pages
                    .into_iter()
                    .flat_map(|page| {
                        chunk_text(&page.text, *max_characters)
                            .into_iter()
                            .map(move |text| Chunk::text(text, path, page.page_number))
                    })
                    .collect()
            }
        };

        info!(chunks = chunks.len(), "PDF parsed");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_image_dir() {
        let root = tempfile::tempdir().unwrap();
        let output_dir = root.path().join("test_output_images");

        let parser = DocumentParser::new(&output_dir, PartitionBackend::Local { max_characters: 4000 }).unwrap();

        assert!(output_dir.is_dir());
        assert_eq!(parser.image_output_dir(), output_dir.as_path());
    }

    #[test]
    fn test_from_config() {
        let root = tempfile::tempdir().unwrap();
        let config = PartitionerConfig {
            image_output_dir: root.path().join("images").display().to_string(),
            ..Default::default()
        };
        assert!(DocumentParser::from_config(&config).is_ok());

        let config = PartitionerConfig {
            provider: "magic".to_string(),
            ..config
        };
        assert!(matches!(
            DocumentParser::from_config(&config),
            Err(IngestionError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_pdf() {
        let root = tempfile::tempdir().unwrap();
        let parser = DocumentParser::new(root.path(), PartitionBackend::Local { max_characters: 4000 }).unwrap();
        let err = parser.parse_pdf(Path::new("/nonexistent/report.pdf")).await.unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound(_)));
    }
}
