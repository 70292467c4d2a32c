//! Inbox Digest: classify a batch of emails into summarized categories.

pub mod api;
pub mod config;
pub mod digest;
pub mod error;
pub mod llm;
pub mod mail;
