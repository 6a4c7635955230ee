//! Vector store records

use super::chunk::ChunkMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An embedding persisted in the vector store
///
/// Insert-only: records are never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub document_text: String,
    pub metadata: ChunkMetadata,
}

impl EmbeddingRecord {
    /// Create a record keyed by a freshly generated identifier
    pub fn new(vector: Vec<f32>, document_text: String, metadata: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            document_text,
            metadata,
        }
    }
}

/// Raw nearest-neighbour hit returned by a vector store
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: Uuid,
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance (`1 - cosine_similarity`)
    pub distance: f32,
}
