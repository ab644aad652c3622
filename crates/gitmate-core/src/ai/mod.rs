//! AI provider layer
//!
//! Talks to OpenAI-compatible chat completion endpoints (OpenAI, Ollama)

pub mod client;
pub mod format;
pub mod providers;
pub mod types;

pub use client::{AiClient, AiClientConfig, ModelBackend, ModelRequest};
pub use providers::ProviderId;
