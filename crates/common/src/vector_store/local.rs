//! Disk-persisted vector store using cosine distance.
//!
//! The collection lives in `<dir>/<collection>.json` and is rewritten
//! (write-then-rename) after every insert. Search is a linear scan, which is
//! fine for the document counts this pipeline handles.

use super::VectorStore;
use crate::errors::{AppError, Result};
use crate::models::{EmbeddingRecord, QueryHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

const BACKEND: &str = "local";

#[derive(Debug, Deserialize)]
struct Snapshot {
    records: Vec<EmbeddingRecord>,
}

/// Vector store persisted as a JSON snapshot on local disk
#[derive(Debug)]
pub struct LocalVectorStore {
    file: PathBuf,
    collection: String,
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl LocalVectorStore {
    /// Open (or create) a collection under `dir`
    pub async fn open(dir: impl AsRef<Path>, collection: &str) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let file = dir.join(format!("{}.json", collection));
        let records = match tokio::fs::read(&file).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::vector_store(BACKEND, format!("Corrupt snapshot {}: {}", file.display(), e))
                })?;
                snapshot.records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %file.display(),
            records = records.len(),
            "Opened local vector store"
        );

        Ok(Self {
            file,
            collection: collection.to_string(),
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &[EmbeddingRecord]) -> Result<()> {
        #[derive(Serialize)]
        struct SnapshotRef<'a> {
            collection: &'a str,
            distance: &'static str,
            records: &'a [EmbeddingRecord],
        }

        let bytes = serde_json::to_vec(&SnapshotRef {
            collection: &self.collection,
            distance: "cosine",
            records,
        })?;

        let tmp = self.file.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.file).await?;
        Ok(())
    }
}

/// Compute cosine distance (`1 - cosine_similarity`) between two vectors.
///
/// Returns 1.0 (orthogonal) if either vector has zero magnitude.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut stored = self.records.write().await;

        let expected = stored
            .first()
            .map(|r| r.vector.len())
            .unwrap_or(records[0].vector.len());
        if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
            return Err(AppError::vector_store(
                BACKEND,
                format!(
                    "Embedding dimension {} does not match collection dimension {}",
                    bad.vector.len(),
                    expected
                ),
            ));
        }

        // Memory only changes once the snapshot is on disk
        let mut updated = Vec::with_capacity(stored.len() + records.len());
        updated.extend_from_slice(&stored);
        updated.extend_from_slice(records);
        self.persist(&updated).await?;
        *stored = updated;

        debug!(added = records.len(), total = stored.len(), "Records added");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let stored = self.records.read().await;
        if let Some(first) = stored.first() {
            if first.vector.len() != embedding.len() {
                return Err(AppError::vector_store(
                    BACKEND,
                    format!(
                        "Query dimension {} does not match collection dimension {}",
                        embedding.len(),
                        first.vector.len()
                    ),
                ));
            }
        }

        let mut hits: Vec<QueryHit> = stored
            .iter()
            .map(|record| QueryHit {
                id: record.id,
                document: record.document_text.clone(),
                metadata: record.metadata.clone(),
                distance: cosine_distance(&record.vector, embedding),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(n_results);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, ChunkType};

    fn record(vector: Vec<f32>, text: &str) -> EmbeddingRecord {
        EmbeddingRecord::new(
            vector,
            text.to_string(),
            ChunkMetadata::for_file(ChunkType::Text, Path::new("doc.pdf"), 1),
        )
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), "test").await.unwrap();

        store
            .add(&[
                record(vec![0.0, 1.0], "orthogonal"),
                record(vec![1.0, 0.0], "same"),
                record(vec![1.0, 1.0], "diagonal"),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "same");
        assert_eq!(hits[1].document, "diagonal");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = record(vec![0.5, 0.5, 0.0], "persisted chunk");
        let id = first.id;

        {
            let store = LocalVectorStore::open(dir.path(), "multimodal_rag").await.unwrap();
            store.add(&[first]).await.unwrap();
        }

        let reopened = LocalVectorStore::open(dir.path(), "multimodal_rag").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened.query(&[0.5, 0.5, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].metadata.filename, "doc.pdf");
    }

    #[tokio::test]
    async fn test_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), "dims").await.unwrap();
        store.add(&[record(vec![1.0, 0.0], "a")]).await.unwrap();

        assert!(store.add(&[record(vec![1.0, 0.0, 0.0], "b")]).await.is_err());
        assert!(store.query(&[1.0, 0.0, 0.0], 1).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("vector_db");
        let store = LocalVectorStore::open(&dir, "multimodal_rag").await.unwrap();
        store.add(&[record(vec![1.0, 0.0], "kept")]).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(store.add(&[record(vec![0.0, 1.0], "lost")]).await.is_err());

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.query(&[0.0, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, "kept");

        std::fs::create_dir_all(&dir).unwrap();
        store.add(&[record(vec![1.0, 1.0], "next")]).await.unwrap();
        let reopened = LocalVectorStore::open(&dir, "multimodal_rag").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path(), "empty").await.unwrap();
        tokio_test::assert_ok!(store.add(&[]).await);
        assert!(!dir.path().join("empty.json").exists());
        assert!(store.query(&[1.0], 0).await.unwrap().is_empty());
        assert!(store.query(&[1.0], 3).await.unwrap().is_empty());
    }
}
