//! Messaging channel adapters
//!
//! Provides the delivery interface the publisher writes to.

mod adapter;
mod telegram;

pub use adapter::ChannelAdapter;
pub use telegram::TelegramAdapter;
