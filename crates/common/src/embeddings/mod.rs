//! Embedding model abstraction
//!
//! Text and images must land in the same vector space so a text query can
//! retrieve image chunks. Providers:
//! - `http`: OpenAI-compatible `/embeddings` server hosting CLIP
//! - `clip`: in-process CLIP ViT-B/32 (cargo feature `clip`)
//! - `mock`: deterministic vectors for tests

#[cfg(feature = "clip")]
mod clip;

#[cfg(feature = "clip")]
pub use clip::ClipEmbedder;

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a piece of text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate an embedding for an image file
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Client for an OpenAI-compatible embedding server serving CLIP
///
/// Images are posted as base64 data URIs with `"modality": "image"`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: Vec<String>,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    modality: Option<&'static str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn make_request(&self, input: String, modality: Option<&'static str>) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            input: vec![input],
            model: &self.model,
            modality,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| AppError::Embedding {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse = response.json().await.map_err(|e| AppError::Embedding {
            message: format!("Failed to parse response: {}", e),
        })?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Embedding {
                message: "Empty response".to_string(),
            })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result = self.make_request(text.to_string(), None).await;
        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, "text", result.is_ok());
        result
    }

    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        let bytes = tokio::fs::read(path).await.map_err(|e| AppError::Embedding {
            message: format!("Failed to read image {}: {}", path.display(), e),
        })?;
        let data_uri = format!("data:{};base64,{}", image_mime_type(path), BASE64.encode(bytes));

        let start = Instant::now();
        let result = self.make_request(data_uri, Some("image")).await;
        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, "image", result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Guess an image MIME type from the file extension
pub fn image_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Mock embedder for testing
///
/// Vectors are unit length and seeded from the input, so equal inputs embed
/// to equal vectors.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, key: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let raw: Vec<f32> = (0..self.dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return raw;
        }
        raw.into_iter().map(|x| x / norm).collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        Ok(self.vector_for(&format!("image:{}", path.display())))
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "http" => Ok(Arc::new(HttpEmbedder::new(config)?)),
        #[cfg(feature = "clip")]
        "clip" => Ok(Arc::new(ClipEmbedder::new(config)?)),
        #[cfg(not(feature = "clip"))]
        "clip" => Err(AppError::Configuration {
            message: "embedding provider 'clip' requires the `clip` cargo feature".to_string(),
        }),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(512);
        let a = embedder.embed_text("pie chart").await.unwrap();
        let b = embedder.embed_text("pie chart").await.unwrap();
        let c = embedder.embed_text("bar chart").await.unwrap();
        assert_eq!(a.len(), 512);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_mock_vectors_are_unit_length() {
        let embedder = MockEmbedder::new(64);
        let v = embedder.embed_image(Path::new("chart.png")).await.unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("a.png")), "image/png");
        assert_eq!(image_mime_type(Path::new("noext")), "image/png");
    }

    #[test]
    fn test_create_embedder_by_provider() {
        let mut config = EmbeddingConfig::default();
        config.provider = "mock".to_string();
        config.dimension = 32;
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.model_name(), "mock-embedding");

        config.provider = "word2vec".to_string();
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_http_embedder_from_config() {
        let config = EmbeddingConfig::default();
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "clip-ViT-B-32");
        assert_eq!(embedder.dimension(), 512);
    }
}
