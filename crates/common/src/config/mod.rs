//! Configuration management for Prism services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// PDF partitioner configuration
    #[serde(default)]
    pub partitioner: PartitionerConfig,

    /// OCR configuration
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Vision-language model configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ingestion CLI configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: http, clip, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (OpenAI-compatible /embeddings endpoint)
    #[serde(default = "default_embedding_api_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Model cache directory for the in-process CLIP provider
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Backend: local, chroma, pgvector
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    /// Directory for the local backend
    #[serde(default = "default_vector_path")]
    pub path: String,

    /// Collection (or table) name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Chroma base URL or PostgreSQL connection URL
    pub url: Option<String>,

    /// Chroma tenant
    #[serde(default = "default_chroma_tenant")]
    pub tenant: String,

    /// Chroma database
    #[serde(default = "default_chroma_database")]
    pub database: String,

    /// Maximum number of PostgreSQL connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Request / connect timeout in seconds
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartitionerConfig {
    /// Partitioner: unstructured, lopdf
    #[serde(default = "default_partitioner_provider")]
    pub provider: String,

    /// Unstructured API base URL
    #[serde(default = "default_partitioner_api_base")]
    pub api_base: String,

    /// Unstructured API key
    pub api_key: Option<String>,

    /// Partitioning strategy
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Directory where images extracted from PDFs are written
    #[serde(default = "default_image_output_dir")]
    pub image_output_dir: String,

    /// Hard maximum chunk size in characters
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,

    /// Soft maximum: start a new chunk after this many characters
    #[serde(default = "default_new_after_n_chars")]
    pub new_after_n_chars: usize,

    /// Combine sections shorter than this many characters
    #[serde(default = "default_combine_under_n_chars")]
    pub combine_under_n_chars: usize,

    /// Request timeout in seconds
    #[serde(default = "default_partitioner_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    /// Path to the tesseract binary
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,

    /// Tesseract language pack
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Provider: ollama, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// Inference endpoint base URL
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Vision-language model name
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the generator per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Directory scanned by the ingestion CLI
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Prometheus metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_embedding_provider() -> String { "http".to_string() }
fn default_embedding_api_base() -> String { "http://localhost:7997".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 60 }
fn default_vector_backend() -> String { "local".to_string() }
fn default_vector_path() -> String { "vector_db".to_string() }
fn default_collection() -> String { crate::DEFAULT_COLLECTION.to_string() }
fn default_chroma_tenant() -> String { "default_tenant".to_string() }
fn default_chroma_database() -> String { "default_database".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_vector_timeout() -> u64 { 30 }
fn default_partitioner_provider() -> String { "unstructured".to_string() }
fn default_partitioner_api_base() -> String { "http://localhost:8200".to_string() }
fn default_strategy() -> String { "hi_res".to_string() }
fn default_image_output_dir() -> String { "assets/extracted_images".to_string() }
fn default_max_characters() -> usize { 4000 }
fn default_new_after_n_chars() -> usize { 3800 }
fn default_combine_under_n_chars() -> usize { 2000 }
fn default_partitioner_timeout() -> u64 { 300 }
fn default_tesseract_cmd() -> String { "tesseract".to_string() }
fn default_ocr_language() -> String { "eng".to_string() }
fn default_generation_provider() -> String { "ollama".to_string() }
fn default_generation_base_url() -> String { "http://localhost:11434".to_string() }
fn default_generation_model() -> String { "llava".to_string() }
fn default_generation_timeout() -> u64 { 300 }
fn default_top_k() -> usize { 5 }
fn default_data_dir() -> String { "sample_documents".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Socket address string the gateway binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PartitionerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: default_embedding_api_base(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            cache_dir: None,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            path: default_vector_path(),
            collection: default_collection(),
            url: None,
            tenant: default_chroma_tenant(),
            database: default_chroma_database(),
            max_connections: default_max_connections(),
            timeout_secs: default_vector_timeout(),
        }
    }
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            provider: default_partitioner_provider(),
            api_base: default_partitioner_api_base(),
            api_key: None,
            strategy: default_strategy(),
            image_output_dir: default_image_output_dir(),
            max_characters: default_max_characters(),
            new_after_n_chars: default_new_after_n_chars(),
            combine_under_n_chars: default_combine_under_n_chars(),
            timeout_secs: default_partitioner_timeout(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: default_tesseract_cmd(),
            language: default_ocr_language(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.embedding.model, "clip-ViT-B-32");
        assert_eq!(config.embedding.dimension, 512);
        assert_eq!(config.vector_store.collection, "multimodal_rag");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.generation.model, "llava");
        assert_eq!(config.ingestion.data_dir, "sample_documents");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.toml");
        std::fs::write(
            &path,
            "[vector_store]\nbackend = \"chroma\"\nurl = \"http://chroma:8000\"\n\n[retrieval]\ntop_k = 3\n",
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.vector_store.backend, "chroma");
        assert_eq!(config.vector_store.url.as_deref(), Some("http://chroma:8000"));
        assert_eq!(config.vector_store.collection, "multimodal_rag");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.partitioner.max_characters, 4000);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.toml");
        std::fs::write(&path, "[ocr]\nlanguage = \"eng\"\n").unwrap();

        // Only this test touches the ocr section
        std::env::set_var("APP__OCR__LANGUAGE", "deu");
        let config = AppConfig::from_file(path.to_str().unwrap());
        std::env::remove_var("APP__OCR__LANGUAGE");

        assert_eq!(config.unwrap().ocr.language, "deu");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.toml");
        std::fs::write(&path, "[observability]\nmetrics_port = 9090\nservice_name = \"prism\"\n").unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.observability.metrics_port, 9090);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }
}
