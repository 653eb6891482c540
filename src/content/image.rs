//! Optional illustrations

use crate::config::ContentConfig;
use crate::models::{ImageModel, ImageRequest};
use std::sync::Arc;

/// Produces an illustration URL for a fact, or an empty string
pub struct Illustrator {
    /// `None` when images are disabled
    model: Option<Arc<dyn ImageModel>>,
    size: String,
}

impl Illustrator {
    pub fn new(model: Arc<dyn ImageModel>, content: &ContentConfig) -> Self {
        Self {
            model: content.images_enabled.then_some(model),
            size: content.image_size.clone(),
        }
    }

    /// Illustrator that never produces an image
    pub fn disabled() -> Self {
        Self {
            model: None,
            size: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    /// URL of a generated illustration; empty when disabled or on any error.
    pub async fn generate_image(&self, title: &str, category: &str) -> String {
        let Some(model) = &self.model else {
            return String::new();
        };

        let request = ImageRequest {
            prompt: build_image_prompt(title, category),
            size: self.size.clone(),
        };

        match model.generate_image(&request).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                tracing::warn!(category = %category, "Image response had no URL");
                String::new()
            }
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "Image generation failed");
                String::new()
            }
        }
    }
}

/// Illustration prompt for a fact
pub fn build_image_prompt(title: &str, category: &str) -> String {
    format!(
        "Illustration on the topic: {}. {}. Realistic style, no text.",
        category, title
    )
}
