//! Ingestion error types

use prism_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Partition error for {path}: {message}")]
    PartitionError { path: String, message: String },

    #[error("OCR error for {path}: {message}")]
    OcrError { path: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Embedding or vector store failure from the shared pipeline
    #[error(transparent)]
    Pipeline(#[from] AppError),
}

impl IngestionError {
    pub fn partition(path: &std::path::Path, message: impl Into<String>) -> Self {
        IngestionError::PartitionError {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}
