//! Prism Common Library
//!
//! Shared code for the Prism ingestion CLI and API gateway including:
//! - Chunk, embedding record and retrieval result models
//! - Embedding model abstraction (CLIP text + image encoders)
//! - Vector store backends (local disk, Chroma, pgvector)
//! - Cross-modal retrieval and answer generation
//! - Error types, configuration, metrics and logging setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod models;
pub mod retrieval;
pub mod telemetry;
pub mod vector_store;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use generation::{Generator, VisionModel};
pub use models::{Chunk, ChunkMetadata, ChunkType, EmbeddingRecord, RetrievalResult, RetrievedContext};
pub use retrieval::Retriever;
pub use vector_store::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model (shared text/image space)
pub const DEFAULT_EMBEDDING_MODEL: &str = "clip-ViT-B-32";

/// Default embedding dimension for CLIP ViT-B/32
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 512;

/// Default vector store collection name
pub const DEFAULT_COLLECTION: &str = "multimodal_rag";
