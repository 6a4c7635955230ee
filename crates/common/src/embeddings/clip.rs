//! In-process CLIP ViT-B/32 via fastembed
//!
//! ONNX inference is CPU-bound, so every call is moved onto the blocking pool.

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const CLIP_DIMENSION: usize = 512;

/// CLIP text and vision encoders sharing one embedding space
pub struct ClipEmbedder {
    text: Arc<Mutex<TextEmbedding>>,
    vision: Arc<Mutex<ImageEmbedding>>,
    model: String,
}

impl ClipEmbedder {
    /// Load both encoders, downloading weights into `cache_dir` on first use
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut text_options =
            InitOptions::new(EmbeddingModel::ClipVitB32).with_show_download_progress(false);
        let mut vision_options = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
            .with_show_download_progress(false);

        if let Some(ref dir) = config.cache_dir {
            text_options = text_options.with_cache_dir(PathBuf::from(dir));
            vision_options = vision_options.with_cache_dir(PathBuf::from(dir));
        }

        tracing::info!(model = %config.model, "Loading CLIP encoders");

        let text = TextEmbedding::try_new(text_options).map_err(|e| AppError::Embedding {
            message: format!("Failed to load CLIP text encoder: {}", e),
        })?;
        let vision = ImageEmbedding::try_new(vision_options).map_err(|e| AppError::Embedding {
            message: format!("Failed to load CLIP vision encoder: {}", e),
        })?;

        Ok(Self {
            text: Arc::new(Mutex::new(text)),
            vision: Arc::new(Mutex::new(vision)),
            model: config.model.clone(),
        })
    }
}

fn first_embedding(mut embeddings: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    if embeddings.is_empty() {
        return Err(AppError::Embedding {
            message: "Empty response".to_string(),
        });
    }
    Ok(embeddings.swap_remove(0))
}

#[async_trait]
impl Embedder for ClipEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.text);
        let input = text.to_string();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let mut encoder = model.lock().map_err(|_| AppError::Internal {
                message: "CLIP text encoder lock poisoned".to_string(),
            })?;
            let embeddings = encoder.embed(vec![input], None).map_err(|e| AppError::Embedding {
                message: format!("CLIP text inference failed: {}", e),
            })?;
            first_embedding(embeddings)
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Embedding task failed: {}", e),
        })?;

        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, "text", result.is_ok());
        result
    }

    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.vision);
        let image = path.to_path_buf();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let mut encoder = model.lock().map_err(|_| AppError::Internal {
                message: "CLIP vision encoder lock poisoned".to_string(),
            })?;
            let embeddings = encoder.embed(vec![image], None).map_err(|e| AppError::Embedding {
                message: format!("CLIP image inference failed: {}", e),
            })?;
            first_embedding(embeddings)
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Embedding task failed: {}", e),
        })?;

        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, "image", result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        CLIP_DIMENSION
    }
}
