//! Chroma vector database over its v2 HTTP API
//!
//! The collection is get-or-created with cosine space on connect, so the
//! distances Chroma returns line up with the other backends.

use super::VectorStore;
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{ChunkMetadata, EmbeddingRecord, QueryHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

const BACKEND: &str = "chroma";
const DEFAULT_CHROMA_URL: &str = "http://localhost:8100";

/// Chroma collection client
pub struct ChromaStore {
    client: reqwest::Client,
    /// `{base}/api/v2/tenants/{tenant}/databases/{database}/collections`
    collections_url: String,
    collection_id: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: serde_json::Value,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<String>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

/// Chroma answers in batch form: one inner list per query embedding
#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Value>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl ChromaStore {
    /// Connect and get-or-create the configured collection
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let base = config
            .url
            .as_deref()
            .unwrap_or(DEFAULT_CHROMA_URL)
            .trim_end_matches('/');

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let collections_url = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            base, config.tenant, config.database
        );

        let request = CreateCollectionRequest {
            name: &config.collection,
            metadata: serde_json::json!({ "hnsw:space": "cosine" }),
            get_or_create: true,
        };

        let response = client
            .post(&collections_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::vector_store(BACKEND, format!("Connect failed: {}", e)))?;
        let collection: CollectionResponse = check(response).await?.json().await?;

        info!(
            url = %base,
            collection = %config.collection,
            collection_id = %collection.id,
            "Connected to Chroma"
        );

        Ok(Self {
            client,
            collections_url,
            collection_id: collection.id,
        })
    }

    fn collection_url(&self, action: &str) -> String {
        format!("{}/{}/{}", self.collections_url, self.collection_id, action)
    }
}

/// Turn a non-2xx response into a vector store error carrying the body
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::vector_store(BACKEND, format!("API error {}: {}", status, body)))
}

/// Flatten a batch query response into hits
fn parse_query_response(response: QueryResponse) -> Result<Vec<QueryHit>> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .map(|(i, raw_id)| {
            let id = Uuid::parse_str(&raw_id).map_err(|e| {
                AppError::vector_store(BACKEND, format!("Invalid record id {}: {}", raw_id, e))
            })?;
            let metadata_value = metadatas.get(i).cloned().flatten().ok_or_else(|| {
                AppError::vector_store(BACKEND, format!("Record {} has no metadata", raw_id))
            })?;
            let metadata: ChunkMetadata = serde_json::from_value(metadata_value)?;
            let distance = distances.get(i).copied().flatten().ok_or_else(|| {
                AppError::vector_store(BACKEND, format!("Record {} has no distance", raw_id))
            })?;

            Ok(QueryHit {
                id,
                document: documents.get(i).cloned().flatten().unwrap_or_default(),
                metadata,
                distance,
            })
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn add(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let metadatas = records
            .iter()
            .map(|r| serde_json::to_value(&r.metadata))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let request = AddRequest {
            ids: records.iter().map(|r| r.id.to_string()).collect(),
            embeddings: records.iter().map(|r| r.vector.as_slice()).collect(),
            documents: records.iter().map(|r| r.document_text.as_str()).collect(),
            metadatas,
        };

        let response = self
            .client
            .post(self.collection_url("add"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::vector_store(BACKEND, format!("Add failed: {}", e)))?;
        check(response).await?;

        debug!(added = records.len(), "Records added to Chroma");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let request = QueryRequest {
            query_embeddings: [embedding],
            n_results,
            include: ["documents", "metadatas", "distances"],
        };

        let response = self
            .client
            .post(self.collection_url("query"))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::vector_store(BACKEND, format!("Query failed: {}", e)))?;
        let body: QueryResponse = check(response).await?.json().await?;

        parse_query_response(body)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .get(self.collection_url("count"))
            .send()
            .await
            .map_err(|e| AppError::vector_store(BACKEND, format!("Count failed: {}", e)))?;
        let count: usize = check(response).await?.json().await?;
        Ok(count)
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkType;

    #[test]
    fn test_parse_query_response() {
        let id = Uuid::new_v4();
        let raw = serde_json::json!({
            "ids": [[id.to_string()]],
            "documents": [["A pie chart with yellow and green slices"]],
            "metadatas": [[{
                "type": "image",
                "source": "sample_documents/standalone_diagram_0.jpg",
                "filename": "standalone_diagram_0.jpg",
                "page_number": 1,
                "image_path": "sample_documents/standalone_diagram_0.jpg"
            }]],
            "distances": [[0.12]],
            "embeddings": null
        });
        let response: QueryResponse = serde_json::from_value(raw).unwrap();
        let hits = parse_query_response(response).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].metadata.chunk_type, ChunkType::Image);
        assert!((hits[0].distance - 0.12).abs() < 1e-6);
    }

    #[test]
    fn test_parse_empty_response() {
        let response: QueryResponse = serde_json::from_value(serde_json::json!({
            "ids": [[]],
            "documents": [[]],
            "metadatas": [[]],
            "distances": [[]]
        }))
        .unwrap();
        assert!(parse_query_response(response).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_uuid_ids() {
        let response: QueryResponse = serde_json::from_value(serde_json::json!({
            "ids": [["doc-1"]],
            "metadatas": [[{"type": "text", "source": "a.pdf", "filename": "a.pdf"}]],
            "distances": [[0.3]]
        }))
        .unwrap();
        assert!(parse_query_response(response).is_err());
    }
}
