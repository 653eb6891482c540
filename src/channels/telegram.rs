//! Telegram channel adapter

use super::adapter::ChannelAdapter;
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Telegram Bot API adapter
pub struct TelegramAdapter {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Turn a Bot API response into the sent message id.
    async fn read_response(method: &str, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            let description = response
                .json::<TelegramResponse>()
                .await
                .ok()
                .and_then(|r| r.description)
                .unwrap_or_default();
            return Err(Error::Delivery(format!(
                "Telegram {} returned HTTP {}: {}",
                method,
                status.as_u16(),
                description
            )));
        }

        let body: TelegramResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(method, error = %e, "Unparseable Telegram success response");
                return Ok(String::new());
            }
        };

        if !body.ok {
            return Err(Error::Delivery(format!(
                "Telegram {} rejected the message: {}",
                method,
                body.description.unwrap_or_default()
            )));
        }

        Ok(body
            .result
            .map(|m| m.message_id.to_string())
            .unwrap_or_default())
    }

    fn transport_error(method: &str, e: reqwest::Error) -> Error {
        // The request URL carries the bot token.
        let e = e.without_url();
        if e.is_timeout() {
            Error::Delivery(format!("Telegram {} timed out", method))
        } else {
            Error::Delivery(format!("Failed to call Telegram {}: {}", method, e))
        }
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, text: &str) -> Result<String> {
        let payload = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        tracing::debug!(chat_id = %self.config.chat_id, "Sending Telegram message");

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(Duration::from_secs(self.config.text_timeout_secs))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::transport_error("sendMessage", e))?;

        Self::read_response("sendMessage", response).await
    }

    async fn send_photo(&self, caption: &str, photo_url: &str) -> Result<String> {
        let form = [
            ("chat_id", self.config.chat_id.as_str()),
            ("caption", caption),
            ("photo", photo_url),
            ("parse_mode", "HTML"),
        ];

        tracing::debug!(chat_id = %self.config.chat_id, "Sending Telegram photo");

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .timeout(Duration::from_secs(self.config.photo_timeout_secs))
            .form(&form)
            .send()
            .await
            .map_err(|e| Self::transport_error("sendPhoto", e))?;

        Self::read_response("sendPhoto", response).await
    }
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
    result: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
}
