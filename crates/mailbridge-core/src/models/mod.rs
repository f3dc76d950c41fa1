//! Data models for MailBridge
//!
//! Transient values that flow through the command pipeline: resolved
//! commands, inbound chat messages, and mail messages.

mod chat;
mod command;
mod mail;

pub use chat::*;
pub use command::*;
pub use mail::*;
