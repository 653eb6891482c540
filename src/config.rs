//! factbot configuration management
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. The resulting [`BotConfig`] is built once at
//! startup and handed to each component.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main factbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram delivery configuration
    pub telegram: TelegramConfig,

    /// Generative API configuration
    pub openai: OpenAiConfig,

    /// Run loop timing
    pub schedule: ScheduleConfig,

    /// What to post about
    pub content: ContentConfig,

    /// Dedup ledger location
    pub storage: StorageConfig,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token
    pub bot_token: String,

    /// Destination chat or channel id (e.g. `@my_channel` or `-100123`)
    pub chat_id: String,

    /// Bot API base URL
    pub api_base: String,

    /// Timeout for `sendMessage` in seconds
    pub text_timeout_secs: u64,

    /// Timeout for `sendPhoto` in seconds
    pub photo_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            text_timeout_secs: 20,
            photo_timeout_secs: 30,
        }
    }
}

/// OpenAI-compatible generative API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,

    /// API base URL (without trailing slash)
    pub base_url: String,

    /// Chat completion model used for facts
    pub text_model: String,

    /// Image model used for illustrations
    pub image_model: String,

    /// Sampling temperature for fact generation
    pub temperature: f32,

    /// Maximum completion length in tokens
    pub max_tokens: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            temperature: 0.6,
            max_tokens: 250,
            timeout_secs: 60,
        }
    }
}

/// Run loop timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Minutes to sleep between runs
    pub interval_minutes: u64,

    /// Facts to publish per run
    pub posts_per_run: u32,

    /// Generation attempts allowed per run, duplicates included
    pub max_attempts: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 360,
            posts_per_run: 1,
            max_attempts: 10,
        }
    }
}

/// Content configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Topic categories, one picked uniformly at random per attempt
    pub categories: Vec<String>,

    /// Language the facts are written in
    pub language: String,

    /// Generate an illustration for each fact
    pub images_enabled: bool,

    /// Image resolution, e.g. `1024x1024`
    pub image_size: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            categories: parse_categories(
                "Nature,Animals,Space,History,Science,Technology,Records",
            ),
            language: "English".to_string(),
            images_enabled: true,
            image_size: "1024x1024".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding published fingerprints
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("facts.sqlite3"),
        }
    }
}

impl BotConfig {
    /// Load configuration from an optional TOML file plus the process
    /// environment, and validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from environment-style keys.
    ///
    /// `lookup` returns the raw value for a key; blank values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = v;
        }
        if let Some(v) = get("TELEGRAM_API_BASE") {
            self.telegram.api_base = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Some(v) = get("OPENAI_TEXT_MODEL") {
            self.openai.text_model = v;
        }
        if let Some(v) = get("OPENAI_IMAGE_MODEL") {
            self.openai.image_model = v;
        }
        if let Some(v) = get("POST_EVERY_MIN") {
            self.schedule.interval_minutes = parse_number("POST_EVERY_MIN", &v)?;
        }
        if let Some(v) = get("POSTS_PER_RUN") {
            self.schedule.posts_per_run = parse_number("POSTS_PER_RUN", &v)?;
        }
        if let Some(v) = get("FACTBOT_MAX_ATTEMPTS") {
            self.schedule.max_attempts = parse_number("FACTBOT_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("CATEGORIES") {
            self.content.categories = parse_categories(&v);
        }
        if let Some(v) = get("FACTBOT_LANGUAGE") {
            self.content.language = v;
        }
        if let Some(v) = get("USE_IMAGES") {
            self.content.images_enabled = parse_flag(&v);
        }
        if let Some(v) = get("IMAGE_SIZE") {
            self.content.image_size = v;
        }
        if let Some(v) = get("FACTBOT_LEDGER_PATH") {
            self.storage.ledger_path = PathBuf::from(v);
        }

        Ok(())
    }

    /// Reject configurations the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.telegram.chat_id.is_empty() {
            missing.push("TELEGRAM_CHAT_ID");
        }
        if self.openai.api_key.is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required credentials: {}",
                missing.join(", ")
            )));
        }

        if self.content.categories.is_empty() {
            return Err(Error::Config("At least one category is required".to_string()));
        }
        if self.schedule.posts_per_run == 0 {
            return Err(Error::Config("posts_per_run must be at least 1".to_string()));
        }
        if self.schedule.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        if self.schedule.posts_per_run > self.schedule.max_attempts {
            return Err(Error::Config(format!(
                "posts_per_run ({}) cannot exceed max_attempts ({})",
                self.schedule.posts_per_run, self.schedule.max_attempts
            )));
        }

        Ok(())
    }

    /// Copy of this configuration with credentials masked, for display.
    pub fn masked(&self) -> Self {
        let mut config = self.clone();
        config.telegram.bot_token = mask_secret(&config.telegram.bot_token);
        config.openai.api_key = mask_secret(&config.openai.api_key);
        config
    }

    /// Sleep between runs
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_minutes.saturating_mul(60))
    }
}

/// Split a comma-separated category list, trimming and dropping blanks.
pub fn parse_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}

/// Mask a secret, keeping only the last four characters visible.
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
