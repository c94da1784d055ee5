//! Shared LLM client library for the youtube-summariser workspace
//!
//! Provides a unified chat interface over multiple LLM providers:
//! - OpenAI (chat completions API)
//! - Anthropic (messages API)
//! - OpenRouter (OpenAI-compatible, streaming only)
//!
//! Configuration is resolved once at client construction: a persisted user
//! document replaces the bundled defaults wholesale, and API keys resolve
//! from the environment before the config.

pub mod client;
pub mod config;
pub mod error;
pub mod providers;

pub use client::{ChatStream, LlmClient, ProviderId, resolve_api_key};
pub use config::{Config, DEFAULT_MAX_TOKENS, ProviderSettings};
pub use error::{LlmError, Result};
