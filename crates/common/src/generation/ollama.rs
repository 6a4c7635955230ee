//! Ollama chat client for vision-language models

use super::VisionModel;
use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Client for Ollama's `/api/chat` endpoint
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Read and base64-encode images, skipping any that cannot be read
    async fn encode_images(images: &[PathBuf]) -> Vec<String> {
        let mut encoded = Vec::with_capacity(images.len());
        for path in images {
            match tokio::fs::read(path).await {
                Ok(bytes) => encoded.push(BASE64.encode(bytes)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable image"),
            }
        }
        encoded
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    async fn complete(&self, prompt: &str, images: &[PathBuf]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: Self::encode_images(images).await,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Request to {} failed: {}", self.base_url, e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Invalid chat response: {}", e),
        })?;

        debug!(model = %self.model, chars = chat.message.content.len(), "Generation complete");
        Ok(chat.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_encode_skips_missing_images() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG").unwrap();

        let encoded = OllamaClient::encode_images(&[
            file.path().to_path_buf(),
            PathBuf::from("/nonexistent/chart.png"),
        ])
        .await;

        assert_eq!(encoded, vec!["iVBORw==".to_string()]);
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "llava",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
                images: Vec::new(),
            }],
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llava",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": false
            })
        );
    }

    #[test]
    fn test_parse_response() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"model":"llava","message":{"role":"assistant","content":"The chart shows growth."},"done":true}"#,
        )
        .unwrap();
        assert_eq!(chat.message.content, "The chart shows growth.");
    }
}
