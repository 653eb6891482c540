//! Post formatting and delivery

use crate::channels::ChannelAdapter;
use crate::content::Fact;
use crate::error::Result;
use std::sync::Arc;

/// Maximum number of hashtags appended to a post
pub const MAX_HASHTAGS: usize = 4;

/// Strip everything but alphanumerics and `_`, prefix `#`, drop empties,
/// keep at most [`MAX_HASHTAGS`] of the leading tags.
pub fn sanitize_hashtags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .take(MAX_HASHTAGS)
        .map(|tag| {
            tag.as_ref()
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape text for the channel's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// `<b>title</b>\nbody`, plus a blank line and hashtags when there are any.
pub fn format_post(fact: &Fact) -> String {
    let mut text = format!(
        "<b>{}</b>\n{}",
        escape_html(&fact.title),
        escape_html(&fact.body)
    );
    let hashtags = sanitize_hashtags(&fact.tags);
    if !hashtags.is_empty() {
        text.push_str("\n\n");
        text.push_str(&hashtags);
    }
    text
}

/// Formats facts and hands them to a channel
pub struct Publisher {
    channel: Arc<dyn ChannelAdapter>,
}

impl Publisher {
    pub fn new(channel: Arc<dyn ChannelAdapter>) -> Self {
        Self { channel }
    }

    /// Send `fact` as a photo with caption when `image_url` is non-empty,
    /// otherwise as a text message.
    pub async fn publish(&self, fact: &Fact, image_url: &str) -> Result<()> {
        let text = format_post(fact);

        let message_id = if image_url.is_empty() {
            self.channel.send_text(&text).await?
        } else {
            self.channel.send_photo(&text, image_url).await?
        };

        tracing::info!(
            channel = %self.channel.name(),
            message_id = %message_id,
            title = %fact.title,
            with_image = !image_url.is_empty(),
            "Published fact"
        );
        Ok(())
    }
}
