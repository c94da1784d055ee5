use thiserror::Error;

use crate::client::ProviderId;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Invalid TOML in configuration file: {0}")]
    ConfigSyntax(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(
        "No API keys found. Set at least one of OPENAI_API_KEY, ANTHROPIC_API_KEY or \
         OPENROUTER_API_KEY, or run `youtube-summarizer init` to configure one."
    )]
    NoApiKeys,

    #[error(
        "{env_var} is not set and no API key for {provider} is stored in the config. {}",
        suggest_providers(alternatives)
    )]
    MissingApiKey {
        provider: ProviderId,
        env_var: &'static str,
        alternatives: Vec<ProviderId>,
    },

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Non-streaming chat is not supported for {0}; use streaming (stream_chat) instead")]
    StreamingOnly(ProviderId),

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Stream decode error: {0}")]
    StreamParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

fn suggest_providers(alternatives: &[ProviderId]) -> String {
    let list = alternatives
        .iter()
        .map(|p| format!("--provider {p}"))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("Try {list} instead.")
}

pub type Result<T> = std::result::Result<T, LlmError>;
