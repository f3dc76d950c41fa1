//! MailBridge Core Library
//!
//! Chat-driven mail assistant: turns direct messages into mailbox actions
//! through a completion service and a rule-based parser, with Discord,
//! Gmail and Anthropic adapters behind injectable traits.

pub mod ai;
pub mod bot;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod error;
pub mod mail;
pub mod models;
pub mod oauth;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

/// Application name for config paths
pub const APP_NAME: &str = "mailbridge";
