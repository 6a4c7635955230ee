//! Ingestion processor
//!
//! Walks a directory, turns each PDF or image into chunks, embeds every chunk
//! with the embedder matching its modality and writes the records to the
//! vector store. Files are processed one at a time; a failing file is logged
//! and skipped.

use crate::errors::IngestionError;
use crate::ocr::ImageProcessor;
use crate::parser::DocumentParser;
use chrono::Utc;
use prism_common::embeddings::Embedder;
use prism_common::metrics;
use prism_common::{Chunk, ChunkType, EmbeddingRecord, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Kind of input file, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "png" | "jpg" | "jpeg" => Some(FileKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Image => "image",
        }
    }
}

/// Outcome of a directory run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    pub files_seen: usize,
    pub files_ingested: usize,
    /// Processed without error but produced no chunks (e.g. OCR found nothing)
    pub files_empty: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub chunks_stored: usize,
}

/// Ingestion processor
pub struct IngestionProcessor {
    parser: DocumentParser,
    images: ImageProcessor,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IngestionProcessor {
    pub fn new(
        parser: DocumentParser,
        images: ImageProcessor,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            parser,
            images,
            embedder,
            store,
        }
    }

    /// Ingest every supported file directly inside `dir`
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn process_directory(&self, dir: &Path) -> Result<IngestionSummary, IngestionError> {
        if !dir.is_dir() {
            return Err(IngestionError::FileNotFound(dir.display().to_string()));
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        info!(files = paths.len(), "Starting ingestion");

        let mut summary = IngestionSummary::default();
        for path in paths {
            summary.files_seen += 1;

            let Some(kind) = FileKind::from_path(&path) else {
                debug!(path = %path.display(), "Unsupported file type, skipping");
                summary.files_skipped += 1;
                continue;
            };

            match self.process_file(&path, kind).await {
                Ok(0) => {
                    warn!(path = %path.display(), "No chunks produced");
                    summary.files_empty += 1;
                }
                Ok(stored) => {
                    summary.files_ingested += 1;
                    summary.chunks_stored += stored;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to ingest file");
                    metrics::record_ingestion_failure(kind.as_str());
                    summary.files_failed += 1;
                }
            }
        }

        info!(
            seen = summary.files_seen,
            ingested = summary.files_ingested,
            empty = summary.files_empty,
            failed = summary.files_failed,
            skipped = summary.files_skipped,
            chunks = summary.chunks_stored,
            "Ingestion complete"
        );
        Ok(summary)
    }

    /// Ingest one file, returning the number of chunks stored
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path, kind: FileKind) -> Result<usize, IngestionError> {
        let start = Instant::now();

        let chunks = match kind {
            FileKind::Pdf => self.parser.parse_pdf(path).await?,
            // OCR failures are already logged; the file simply yields nothing
            FileKind::Image => self.images.process_image(path).await.into_iter().collect(),
        };

        let records = self.embed_chunks(chunks).await;
        let stored = records.len();
        self.store.add(&records).await?;

        metrics::record_ingestion(start.elapsed().as_secs_f64(), stored, kind.as_str());
        info!(chunks = stored, "Saved chunks");
        Ok(stored)
    }

    /// Embed chunks into records, dropping any chunk that fails to embed
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Vec<EmbeddingRecord> {
        let ingested_at = Utc::now();
        let mut records = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let vector = match self.embed_chunk(&chunk).await {
                Ok(vector) if !vector.is_empty() => vector,
                Ok(_) => {
                    warn!(source = %chunk.metadata.source, "Empty embedding, skipping chunk");
                    continue;
                }
                Err(e) => {
                    warn!(source = %chunk.metadata.source, error = %e, "Embedding failed, skipping chunk");
                    continue;
                }
            };

            let mut metadata = chunk.metadata.clone();
            metadata.ingested_at = Some(ingested_at);
            records.push(EmbeddingRecord::new(vector, chunk.document_text(), metadata));
        }

        records
    }

    async fn embed_chunk(&self, chunk: &Chunk) -> prism_common::Result<Vec<f32>> {
        match (chunk.chunk_type(), chunk.metadata.image_path.as_deref()) {
            (ChunkType::Image, Some(image_path)) => self.embedder.embed_image(Path::new(image_path)).await,
            _ => self.embedder.embed_text(chunk.embedding_text()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PartitionBackend;
    use prism_common::config::OcrConfig;
    use prism_common::embeddings::MockEmbedder;
    use prism_common::vector_store::LocalVectorStore;

    async fn processor(root: &Path) -> (IngestionProcessor, Arc<LocalVectorStore>) {
        let parser = DocumentParser::new(
            root.join("images"),
            PartitionBackend::Local { max_characters: 4000 },
        )
        .unwrap();
        let images = ImageProcessor::new(&OcrConfig {
            tesseract_cmd: "definitely-not-tesseract".to_string(),
            ..Default::default()
        });
        let store = Arc::new(LocalVectorStore::open(root.join("vector_db"), "test").await.unwrap());
        let processor = IngestionProcessor::new(parser, images, Arc::new(MockEmbedder::new(16)), store.clone());
        (processor, store)
    }

    #[test]
    fn test_file_kind_routing() {
        assert_eq!(FileKind::from_path(Path::new("a/report.PDF")), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_path(Path::new("chart.jpeg")), Some(FileKind::Image));
        assert_eq!(FileKind::from_path(Path::new("scan.png")), Some(FileKind::Image));
        assert_eq!(FileKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(FileKind::from_path(Path::new("README")), None);
    }

    #[tokio::test]
    async fn test_bad_files_are_logged_and_counted() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("sample_documents");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("broken.pdf"), b"not a pdf").unwrap();
        std::fs::write(data.join("notes.txt"), b"ignored").unwrap();
        std::fs::write(data.join("chart.png"), b"\x89PNG").unwrap();

        let (processor, store) = processor(root.path()).await;
        let summary = tokio_test::assert_ok!(processor.process_directory(&data).await);

        assert_eq!(
            summary,
            IngestionSummary {
                files_seen: 3,
                files_ingested: 0,
                files_empty: 1,
                files_failed: 1,
                files_skipped: 1,
                chunks_stored: 0,
            }
        );
        assert_eq!(store.count().await.unwrap(), 0);
    }

    fn write_pdf(path: &Path, line: &str) {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_ingested_and_empty_files_counted_apart() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("sample_documents");
        std::fs::create_dir_all(&data).unwrap();
        write_pdf(&data.join("doc_1_Revenue.pdf"), "Revenue grew 12 percent year over year");
        std::fs::write(data.join("scan.png"), b"\x89PNG").unwrap();

        let (processor, store) = processor(root.path()).await;
        let summary = processor.process_directory(&data).await.unwrap();

        assert_eq!(summary.files_ingested, 1);
        assert_eq!(summary.files_empty, 1);
        assert_eq!(summary.files_failed, 0);
        assert!(summary.chunks_stored >= 1);
        assert_eq!(store.count().await.unwrap(), summary.chunks_stored);
    }

    #[tokio::test]
    async fn test_chunks_embedded_by_modality() {
        let root = tempfile::tempdir().unwrap();
        let image = root.path().join("pie_chart.png");
        std::fs::write(&image, b"\x89PNG").unwrap();

        let (processor, store) = processor(root.path()).await;
        let chunks = vec![
            Chunk::text("Supply chain costs fell 8%.", Path::new("doc_2.pdf"), 2),
            Chunk::image("", &image, &image, 1),
        ];

        let records = processor.embed_chunks(chunks).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.metadata.ingested_at.is_some()));
        assert_eq!(records[1].document_text, "Image content from pie_chart.png");

        let embedder = MockEmbedder::new(16);
        assert_eq!(records[0].vector, embedder.embed_text("Supply chain costs fell 8%.").await.unwrap());
        assert_eq!(records[1].vector, embedder.embed_image(&image).await.unwrap());

        store.add(&records).await.unwrap();
        let hits = store.query(&records[1].vector, 1).await.unwrap();
        assert_eq!(hits[0].metadata.chunk_type, ChunkType::Image);
        assert_eq!(hits[0].metadata.image_path, Some(image.display().to_string()));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let (processor, _) = processor(root.path()).await;
        let err = processor.process_directory(&root.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound(_)));
    }
}
