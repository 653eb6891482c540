//! Fact generation
//!
//! Asks the text model for a JSON object with `title`, `body` and `tags`.
//! Model output is parsed leniently and anything unusable is replaced by a
//! fallback fact, so generation never fails the run.

use crate::config::{ContentConfig, OpenAiConfig};
use crate::error::{Error, Result};
use crate::ledger::Fingerprint;
use crate::models::{CompletionRequest, TextModel};
use serde_json::Value;
use std::sync::Arc;

/// Maximum title length in characters
pub const MAX_TITLE_CHARS: usize = 60;

const FALLBACK_BODY: &str = "Generation failed.";

/// A short fact ready to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

impl Fact {
    /// Placeholder used when the model output cannot be used
    pub fn fallback(category: &str) -> Self {
        Self {
            title: fallback_title(category),
            body: FALLBACK_BODY.to_string(),
            tags: vec![category.to_string()],
        }
    }

    /// Dedup key for this fact
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.title, &self.body)
    }
}

fn fallback_title(category: &str) -> String {
    truncate_title(&format!("Fact: {}", category))
}

/// Generates facts for a category using a [`TextModel`]
pub struct FactGenerator {
    model: Arc<dyn TextModel>,
    language: String,
    temperature: f32,
    max_tokens: u32,
}

impl FactGenerator {
    pub fn new(model: Arc<dyn TextModel>, openai: &OpenAiConfig, content: &ContentConfig) -> Self {
        Self {
            model,
            language: content.language.clone(),
            temperature: openai.temperature,
            max_tokens: openai.max_tokens,
        }
    }

    /// Generate a fact for `category`. Never fails; errors produce
    /// [`Fact::fallback`].
    pub async fn generate(&self, category: &str) -> Fact {
        let request = CompletionRequest {
            prompt: build_prompt(category, &self.language),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let raw = match self.model.complete(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "Fact generation failed");
                return Fact::fallback(category);
            }
        };

        match parse_fact(&raw, category) {
            Ok(fact) => fact,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    error = %e,
                    response_length = raw.len(),
                    "Unusable model output, using fallback fact"
                );
                Fact::fallback(category)
            }
        }
    }
}

/// Prompt asking for one fact as a JSON object
pub fn build_prompt(category: &str, language: &str) -> String {
    format!(
        r#"Write one interesting, plausible fact about the world in {language}.
Category: {category}.
Format: 2-4 short sentences, no emoji and no links.
Return strictly JSON with the keys "title", "body", "tags".
Example:
{{"title":"Why flamingos are pink",
 "body":"Carotenoids from their food build up in the feathers, which makes the birds look pink.",
 "tags":["animals","nature","facts"]}}
"#
    )
}

/// Span from the first `{` to the last `}`, surrounding prose ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse raw model output into a fact, filling missing fields with defaults.
pub fn parse_fact(raw: &str, category: &str) -> Result<Fact> {
    let json = extract_json_object(raw)
        .ok_or_else(|| Error::Generation("No JSON object in model output".to_string()))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Generation(format!("Malformed JSON in model output: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::Generation("Model output is not a JSON object".to_string()))?;

    let title = object
        .get("title")
        .and_then(value_text)
        .map(|t| truncate_title(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title(category));

    let body = object
        .get("body")
        .and_then(value_text)
        .unwrap_or_else(|| FALLBACK_BODY.to_string());

    let tags = parse_tags(object.get("tags"), category);

    Ok(Fact { title, body, tags })
}

/// Trim, cut to [`MAX_TITLE_CHARS`] characters, trim again.
pub fn truncate_title(title: &str) -> String {
    let cut: String = title.trim().chars().take(MAX_TITLE_CHARS).collect();
    cut.trim_end().to_string()
}

fn parse_tags(value: Option<&Value>, category: &str) -> Vec<String> {
    let tags: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
        Some(other) if is_falsy(other) => Vec::new(),
        Some(other) => value_text(other).into_iter().collect(),
        None => Vec::new(),
    };

    if tags.is_empty() {
        vec![category.to_string()]
    } else {
        tags
    }
}

/// `false`, zero and `{}` count as "no tags".
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Trimmed string form of a JSON value; `None` for null and blank strings.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
