//! OpenAI-compatible HTTP client

use super::{CompletionRequest, ImageModel, ImageRequest, TextModel};
use crate::config::OpenAiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Client for `/chat/completions` and `/images/generations`
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "{} returned HTTP {}: {}",
                path,
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Failed to parse {} response: {}", path, e)))
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.config.text_model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        tracing::debug!(model = %self.config.text_model, "Requesting completion");

        let result: ChatCompletionResponse = self.post("chat/completions", &payload).await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Generation("Completion contained no choices".to_string()))
    }
}

#[async_trait]
impl ImageModel for OpenAiClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<String>> {
        let payload = serde_json::json!({
            "model": self.config.image_model,
            "prompt": request.prompt,
            "size": request.size,
            "n": 1,
        });

        tracing::debug!(model = %self.config.image_model, size = %request.size, "Requesting image");

        let result: ImageGenerationResponse = self.post("images/generations", &payload).await?;
        Ok(result
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .filter(|url| !url.is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}
