//! Cross-modal retrieval
//!
//! A text query is embedded into the shared text/image space and matched
//! against every stored chunk regardless of modality. The store is asked for
//! twice as many candidates as requested, the candidates are re-ranked by
//! similarity and the best `k` are split into text and image buckets.

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::models::{RetrievalResult, RetrievedContext};
use crate::vector_store::VectorStore;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Candidate pool size relative to `k`
pub const CANDIDATE_MULTIPLIER: usize = 2;

/// Query-time retriever over a vector store
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Retrieve the `k` most relevant chunks for `query`
    ///
    /// `k == 0` short-circuits to an empty context without touching the
    /// embedder or the store.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext> {
        if k == 0 {
            return Ok(RetrievedContext::default());
        }

        let query_vector = self.embedder.embed_text(query).await?;
        let hits = self
            .store
            .query(&query_vector, k.saturating_mul(CANDIDATE_MULTIPLIER))
            .await?;
        let candidates = hits.len();

        let mut results: Vec<RetrievalResult> = hits.into_iter().map(Into::into).collect();
        rerank(&mut results);
        results.truncate(k);

        let context = categorize(results);
        debug!(
            candidates,
            text = context.text_chunks.len(),
            images = context.images.len(),
            "Retrieval complete"
        );
        Ok(context)
    }
}

/// Sort by descending score; ties keep store order and NaN sinks to the end
pub fn rerank(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    });
}

/// Split ranked results into text and image buckets, preserving order
pub fn categorize(results: Vec<RetrievalResult>) -> RetrievedContext {
    let (images, text_chunks) = results.into_iter().partition(RetrievalResult::is_image);
    RetrievedContext { text_chunks, images }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::{ChunkMetadata, ChunkType, EmbeddingRecord, QueryHit};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Embedder that counts calls and returns a fixed vector
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(vec![1.0, 0.0])
        }

        async fn embed_image(&self, _path: &Path) -> Result<Vec<f32>> {
            Ok(vec![0.0, 1.0])
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Store that returns canned hits and records the requested `n_results`
    struct CannedStore {
        hits: Vec<QueryHit>,
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
        async fn add(&self, _records: &[EmbeddingRecord]) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>> {
            self.requested.lock().unwrap().push(n_results);
            Ok(self.hits.iter().take(n_results).cloned().collect())
        }

        async fn count(&self) -> Result<usize> {
            Ok(self.hits.len())
        }

        fn backend(&self) -> &'static str {
            "canned"
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn add(&self, _records: &[EmbeddingRecord]) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _embedding: &[f32], _n_results: usize) -> Result<Vec<QueryHit>> {
            Err(AppError::vector_store("failing", "unreachable"))
        }

        async fn count(&self) -> Result<usize> {
            Ok(0)
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    fn hit(chunk_type: ChunkType, doc: &str, distance: f32) -> QueryHit {
        let file = if chunk_type == ChunkType::Image { "chart.png" } else { "report.pdf" };
        QueryHit {
            id: Uuid::new_v4(),
            document: doc.to_string(),
            metadata: ChunkMetadata::for_file(chunk_type, Path::new(file), 1),
            distance,
        }
    }

    fn result(doc: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            id: Uuid::new_v4(),
            content: doc.to_string(),
            metadata: ChunkMetadata::for_file(ChunkType::Text, Path::new("a.pdf"), 1),
            score,
        }
    }

    fn retriever(hits: Vec<QueryHit>) -> (Retriever, Arc<CountingEmbedder>, Arc<CannedStore>) {
        let embedder = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        let store = Arc::new(CannedStore { hits, requested: Mutex::new(Vec::new()) });
        (Retriever::new(embedder.clone(), store.clone()), embedder, store)
    }

    #[tokio::test]
    async fn test_requests_twice_k_and_truncates() {
        let hits = (0..10)
            .map(|i| hit(ChunkType::Text, &format!("chunk {}", i), i as f32 * 0.05))
            .collect();
        let (retriever, _, store) = retriever(hits);

        let context = retriever.retrieve("revenue growth", 3).await.unwrap();

        assert_eq!(store.requested.lock().unwrap().as_slice(), &[6]);
        assert_eq!(context.len(), 3);
        assert_eq!(context.text_chunks[0].content, "chunk 0");
    }

    #[tokio::test]
    async fn test_huge_k_saturates_candidate_count() {
        let hits = (0..4)
            .map(|i| hit(ChunkType::Text, &format!("chunk {}", i), i as f32 * 0.1))
            .collect();
        let (retriever, _, store) = retriever(hits);

        let context = retriever.retrieve("revenue growth", usize::MAX).await.unwrap();

        assert_eq!(store.requested.lock().unwrap().as_slice(), &[usize::MAX]);
        assert_eq!(context.len(), 4);
    }

    #[tokio::test]
    async fn test_reranks_and_buckets_by_modality() {
        // Out of order on purpose: the store is not trusted to sort
        let hits = vec![
            hit(ChunkType::Text, "text far", 0.6),
            hit(ChunkType::Image, "Image extracted from page.", 0.1),
            hit(ChunkType::Table, "<table></table>", 0.3),
            hit(ChunkType::Image, "pie chart", 0.2),
        ];
        let (retriever, _, _) = retriever(hits);

        let context = retriever.retrieve("which slice is largest", 3).await.unwrap();

        assert_eq!(context.images.len(), 2);
        assert_eq!(context.images[0].content, "Image extracted from page.");
        assert_eq!(context.images[1].content, "pie chart");
        assert_eq!(context.text_chunks.len(), 1);
        assert_eq!(context.text_chunks[0].metadata.chunk_type, ChunkType::Table);
        assert!((context.images[0].score - 0.9).abs() < 1e-6);
        assert_eq!(context.image_paths(), Vec::<&str>::new());
    }

    #[tokio::test]
    async fn test_zero_k_skips_embedding() {
        let (retriever, embedder, store) = retriever(vec![hit(ChunkType::Text, "a", 0.1)]);

        let context = retriever.retrieve("anything", 0).await.unwrap();

        assert!(context.is_empty());
        assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 0);
        assert!(store.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_context() {
        let (retriever, embedder, _) = retriever(Vec::new());
        let context = retriever.retrieve("anything", 5).await.unwrap();
        assert!(context.is_empty());
        assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let embedder = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        let retriever = Retriever::new(embedder, Arc::new(FailingStore));
        let err = retriever.retrieve("anything", 2).await.unwrap_err();
        assert!(matches!(err, AppError::VectorStore { .. }));
    }

    #[test]
    fn test_rerank_is_stable_and_sinks_nan() {
        let mut results = vec![
            result("nan", f32::NAN),
            result("first tie", 0.5),
            result("best", 0.9),
            result("second tie", 0.5),
        ];
        rerank(&mut results);
        let order: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["best", "first tie", "second tie", "nan"]);
    }
}
