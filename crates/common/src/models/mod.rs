//! Pipeline data model
//!
//! Chunks produced at ingestion, the records persisted in the vector store,
//! and the transient results assembled at query time.

mod chunk;
mod record;
mod retrieval;

pub use chunk::{Chunk, ChunkMetadata, ChunkType};
pub use record::{EmbeddingRecord, QueryHit};
pub use retrieval::{RetrievalResult, RetrievedContext};
