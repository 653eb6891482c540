//! Channel adapter trait

use crate::error::Result;
use async_trait::async_trait;

/// Outbound side of a messaging channel
///
/// Markup in `text` and `caption` is the HTML subset understood by the
/// channel. Any failure, including a non-success response or a timeout,
/// is reported as [`crate::Error::Delivery`].
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel name, e.g. `"telegram"`
    fn name(&self) -> &str;

    /// Send a formatted text message; returns the channel's message id
    async fn send_text(&self, text: &str) -> Result<String>;

    /// Send a photo by URL with a formatted caption; returns the message id
    async fn send_photo(&self, caption: &str, photo_url: &str) -> Result<String>;
}
