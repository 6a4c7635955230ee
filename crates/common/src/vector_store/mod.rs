//! Vector store backends
//!
//! Insert and nearest-neighbour query only; records are never updated.
//! Every backend reports cosine distance so scores are comparable.
//! - `local`: JSON snapshot in a directory on local disk
//! - `chroma`: Chroma server over its HTTP API
//! - `pgvector`: PostgreSQL with the pgvector extension

mod chroma;
mod local;
mod pgvector;

pub use chroma::ChromaStore;
pub use local::{cosine_distance, LocalVectorStore};
pub use pgvector::PgVectorStore;

use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{EmbeddingRecord, QueryHit};
use async_trait::async_trait;
use std::sync::Arc;

/// A storage backend for embeddings with similarity search
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records. An empty batch is a no-op.
    async fn add(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Return the `n_results` nearest records ordered by ascending distance
    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    /// Backend name for logs and readiness checks
    fn backend(&self) -> &'static str;
}

/// Open the configured vector store
pub async fn create_vector_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "local" => {
            let store = LocalVectorStore::open(&config.path, &config.collection).await?;
            Ok(Arc::new(store))
        }
        "chroma" => {
            let store = ChromaStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        "pgvector" => {
            let store = PgVectorStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown vector store backend: {}", other),
        }),
    }
}

/// Render an embedding as a pgvector / JSON array literal
pub(crate) fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let config = VectorStoreConfig {
            backend: "faiss".to_string(),
            ..Default::default()
        };
        let err = create_vector_store(&config).await.err().unwrap();
        assert!(err.to_string().contains("faiss"));
    }

    #[tokio::test]
    async fn test_local_backend_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            path: dir.path().join("vector_db").display().to_string(),
            ..Default::default()
        };
        let store = create_vector_store(&config).await.unwrap();
        assert_eq!(store.backend(), "local");
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(dir.path().join("vector_db").is_dir());
    }
}
