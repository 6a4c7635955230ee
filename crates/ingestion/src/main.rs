//! Prism Ingestion CLI
//!
//! `ingest [DATA_DIR]` indexes a directory of documents:
//! 1. PDFs are partitioned into text, table and image chunks
//! 2. Standalone images are OCR'd
//! 3. Every chunk is embedded into the shared text/image space
//! 4. Records are written to the vector store

mod chunker;
mod errors;
mod ocr;
mod parser;
mod pdf;
mod processor;
mod unstructured;

use anyhow::Context;
use ocr::ImageProcessor;
use parser::DocumentParser;
use prism_common::{
    config::AppConfig, embeddings::create_embedder, telemetry, vector_store::create_vector_store,
    VERSION,
};
use processor::IngestionProcessor;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    telemetry::init_tracing(&config.observability);

    info!("Starting Prism Ingestion v{}", VERSION);

    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.ingestion.data_dir));

    let embedder = create_embedder(&config.embedding).context("Failed to create embedder")?;
    info!(model = %embedder.model_name(), dimension = embedder.dimension(), "Embedder ready");

    let store = create_vector_store(&config.vector_store)
        .await
        .context("Failed to open vector store")?;

    let parser = DocumentParser::from_config(&config.partitioner)
        .context("Failed to create document parser")?;
    info!(
        provider = %config.partitioner.provider,
        image_dir = %parser.image_output_dir().display(),
        "Document parser ready"
    );
    let images = ImageProcessor::new(&config.ocr);

    let processor = IngestionProcessor::new(parser, images, embedder, store.clone());

    info!(dir = %data_dir.display(), backend = store.backend(), "Starting ingestion");
    let summary = processor
        .process_directory(&data_dir)
        .await
        .with_context(|| format!("Failed to ingest {}", data_dir.display()))?;

    info!(
        files = summary.files_ingested,
        empty = summary.files_empty,
        failed = summary.files_failed,
        chunks = summary.chunks_stored,
        total_records = store.count().await?,
        "Ingestion complete"
    );
    Ok(())
}
