//! factbot - Scheduled fact publisher
//!
//! factbot periodically asks a language model for a short fact on a random
//! topic, optionally illustrates it, skips anything it has posted before and
//! publishes the rest to a Telegram channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── Runner ────────────────────────────┐
//! │                                                                 │
//! │  category ──► FactGenerator ──► Ledger ──► Illustrator ──► Publisher
//! │                   │              │             │              │
//! └───────────────────┼──────────────┼─────────────┼──────────────┼─┘
//!                     ▼              ▼             ▼              ▼
//!               TextModel       SQLite file    ImageModel   ChannelAdapter
//!              (OpenAI API)                   (OpenAI API)  (Telegram API)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Layered configuration (defaults, TOML, environment)
//! - [`models`]: Generative model traits and the OpenAI-compatible client
//! - [`content`]: Fact and illustration generation
//! - [`ledger`]: Fingerprints and the append-only dedup store
//! - [`channels`]: Messaging channel adapters
//! - [`publisher`]: Post formatting and delivery
//! - [`scheduler`]: The publishing run loop

pub mod channels;
pub mod config;
pub mod content;
pub mod error;
pub mod ledger;
pub mod models;
pub mod publisher;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use config::BotConfig;
pub use error::{Error, Result};
pub use scheduler::{RunReport, RunState, Runner};
