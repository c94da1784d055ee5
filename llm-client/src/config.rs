use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::client::ProviderId;
use crate::error::{LlmError, Result};

/// Default document shipped with the binary, used when no user config exists.
const BUNDLED_CONFIG: &str = include_str!("bundled_config.toml");

pub const DEFAULT_MAX_TOKENS: u32 = 3000;

/// Effective configuration: a default provider plus one settings record per
/// provider. Every provider key is always present; an absent record in the
/// source document behaves as an empty one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderId,

    #[serde(default)]
    pub openai: ProviderSettings,

    #[serde(default)]
    pub anthropic: ProviderSettings,

    #[serde(default)]
    pub openrouter: ProviderSettings,
}

/// Per-provider settings. All fields optional; unset fields fall back to the
/// built-in defaults via the accessors on [`Config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for Config {
    /// Hard-coded fallback used when even the bundled document is unreadable.
    fn default() -> Self {
        let defaults = |provider: ProviderId| ProviderSettings {
            api_key: None,
            model: Some(provider.default_model().to_string()),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        };
        Self {
            provider: ProviderId::OpenAi,
            openai: defaults(ProviderId::OpenAi),
            anthropic: defaults(ProviderId::Anthropic),
            openrouter: defaults(ProviderId::OpenRouter),
        }
    }
}

impl Config {
    /// User config directory.
    ///
    /// Windows: `%APPDATA%\youtube-summariser\`
    /// macOS/Linux: `~/.youtube-summariser/`
    pub fn config_dir() -> Result<PathBuf> {
        if cfg!(windows) {
            if let Ok(appdata) = std::env::var("APPDATA") {
                return Ok(PathBuf::from(appdata).join("youtube-summariser"));
            }
        }
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| LlmError::ConfigError("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".youtube-summariser"))
    }

    /// Full path to the persisted user config document.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Parse a configuration document. A syntax error surfaces as
    /// [`LlmError::ConfigSyntax`].
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Tolerant read of the user config: a missing or malformed file is `None`.
    pub fn load_user() -> Option<Self> {
        let path = Self::config_path().ok()?;
        if !path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("could not read {}: {e}", path.display());
                return None;
            }
        };
        match Self::from_toml(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("ignoring malformed config at {}: {e}", path.display());
                None
            }
        }
    }

    /// Resolve the effective configuration.
    ///
    /// A user document, when present and well-formed, is returned verbatim:
    /// it replaces the bundled document wholesale, never merging with it.
    /// Otherwise the bundled document applies, and if that is unreadable the
    /// hard-coded [`Config::default`] does.
    pub fn load_effective() -> Self {
        if let Some(user) = Self::load_user() {
            return user;
        }
        Self::bundled()
    }

    fn bundled() -> Self {
        Self::from_toml(BUNDLED_CONFIG).unwrap_or_else(|e| {
            log::warn!("bundled config is unreadable ({e}); using built-in defaults");
            Self::default()
        })
    }

    /// Save as the user config document, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn settings(&self, provider: ProviderId) -> &ProviderSettings {
        match provider {
            ProviderId::OpenAi => &self.openai,
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::OpenRouter => &self.openrouter,
        }
    }

    pub fn settings_mut(&mut self, provider: ProviderId) -> &mut ProviderSettings {
        match provider {
            ProviderId::OpenAi => &mut self.openai,
            ProviderId::Anthropic => &mut self.anthropic,
            ProviderId::OpenRouter => &mut self.openrouter,
        }
    }

    /// Model for a provider, falling back to the built-in default.
    pub fn model(&self, provider: ProviderId) -> &str {
        self.settings(provider)
            .model
            .as_deref()
            .unwrap_or_else(|| provider.default_model())
    }

    /// Token cap for a provider, falling back to the built-in default.
    pub fn max_tokens(&self, provider: ProviderId) -> u32 {
        self.settings(provider)
            .max_tokens
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }
}
