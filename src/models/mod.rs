//! Generative model clients
//!
//! The fact and image generators talk to the model through these traits, so
//! the run loop never depends on a concrete HTTP API.

mod openai;

pub use openai::OpenAiClient;

use crate::error::Result;
use async_trait::async_trait;

/// Parameters for one text completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Parameters for one image generation
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Resolution such as `1024x1024`
    pub size: String,
}

/// A model that turns a prompt into free-form text
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Raw completion text for the request
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// A model that turns a prompt into a hosted image
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// URL of the generated image, or `None` if the API returned no URL
    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<String>>;
}
