//! Answer generation with a vision-language model
//!
//! Retrieved text goes into the prompt; retrieved images are attached to the
//! request. Providers:
//! - `ollama`: local Ollama server (LLaVA by default)
//! - `mock`: deterministic answers for tests and offline runs

mod ollama;

pub use ollama::OllamaClient;

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::models::RetrievedContext;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Answer returned when retrieval found nothing to ground on
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information in the documents.";

/// A model that answers a prompt, optionally looking at images
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, prompt: &str, images: &[PathBuf]) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Build the grounded prompt from the query and retrieved text
pub fn build_prompt(query: &str, context: &RetrievedContext) -> String {
    let context_text: String = context
        .text_chunks
        .iter()
        .map(|item| format!("\n- {}\n", item.content))
        .collect();

    format!(
        "You are a helpful assistant. Use the following context and images to answer the question.\n\
         Question: {}\n\n\
         Context from documents:\n{}\n\n\
         Instruction: Answer the question based on the text and the provided images.",
        query, context_text
    )
}

/// Generates answers grounded on retrieved context
pub struct Generator {
    model: Arc<dyn VisionModel>,
}

impl Generator {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer `query` from `context`
    ///
    /// Skips the model entirely when there is no text and no image to show it.
    pub async fn generate_answer(&self, query: &str, context: &RetrievedContext) -> Result<String> {
        let image_paths: Vec<PathBuf> = context
            .image_paths()
            .into_iter()
            .map(PathBuf::from)
            .collect();

        if context.text_chunks.is_empty() && image_paths.is_empty() {
            debug!("No context retrieved, returning fallback answer");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = build_prompt(query, context);
        info!(
            model = %self.model.model_name(),
            text_chunks = context.text_chunks.len(),
            images = image_paths.len(),
            "Generating answer"
        );

        self.model.complete(&prompt, &image_paths).await
    }
}

/// Mock model for testing
pub struct MockVisionModel;

#[async_trait]
impl VisionModel for MockVisionModel {
    async fn complete(&self, prompt: &str, images: &[PathBuf]) -> Result<String> {
        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or_default();
        let text_sources = prompt.lines().filter(|line| line.starts_with("- ")).count();

        Ok(format!(
            "Mock answer to \"{}\" from {} text source(s) and {} image(s).",
            question,
            text_sources,
            images.len()
        ))
    }

    fn model_name(&self) -> &str {
        "mock-vlm"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Generator> {
    let model: Arc<dyn VisionModel> = match config.provider.as_str() {
        "ollama" => Arc::new(OllamaClient::new(config)?),
        "mock" => Arc::new(MockVisionModel),
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown generation provider: {}", other),
            })
        }
    };
    Ok(Generator::new(model))
}
