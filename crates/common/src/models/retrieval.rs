//! Query-time results

use super::chunk::ChunkMetadata;
use super::record::QueryHit;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scored chunk retrieved for a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: Uuid,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Similarity score (`1 - distance`), higher is better
    pub score: f32,
}

impl From<QueryHit> for RetrievalResult {
    fn from(hit: QueryHit) -> Self {
        Self {
            id: hit.id,
            content: hit.document,
            metadata: hit.metadata,
            score: 1.0 - hit.distance,
        }
    }
}

impl RetrievalResult {
    pub fn is_image(&self) -> bool {
        self.metadata.is_image()
    }
}

/// Retrieved evidence split by modality for the generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Text and table chunks, best first
    pub text_chunks: Vec<RetrievalResult>,

    /// Image chunks, best first
    pub images: Vec<RetrievalResult>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.text_chunks.is_empty() && self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text_chunks.len() + self.images.len()
    }

    /// Paths of the image files backing the image results
    pub fn image_paths(&self) -> Vec<&str> {
        self.images
            .iter()
            .filter_map(|item| item.metadata.image_path.as_deref())
            .collect()
    }
}
