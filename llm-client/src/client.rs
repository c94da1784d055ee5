use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{LlmError, Result};
use crate::providers::anthropic::AnthropicClient;
use crate::providers::openai_compatible::OpenAiCompatibleClient;

/// Lazy, ordered sequence of response fragments. Dropping the stream abandons
/// the underlying transport connection.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    OpenAi,
    Anthropic,
    OpenRouter,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [Self::OpenAi, Self::Anthropic, Self::OpenRouter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-5.2",
            Self::Anthropic => "claude-sonnet-4-5-20250929",
            Self::OpenRouter => "anthropic/claude-sonnet-4.5",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(LlmError::UnsupportedProvider(s.to_string())),
        }
    }
}

type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the API key for a provider: environment variable first, then the
/// key stored in the config. The environment strictly wins when both exist.
pub fn resolve_api_key(config: &Config, provider: ProviderId) -> Option<String> {
    resolve_api_key_with(&process_env, config, provider)
}

fn resolve_api_key_with(
    env: EnvLookup,
    config: &Config,
    provider: ProviderId,
) -> Option<String> {
    env(provider.env_var()).or_else(|| {
        config
            .settings(provider)
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
    })
}

/// Backend handle, owned by one client for its lifetime. Holds the provider
/// SDK transport state and must not be shared across concurrent calls.
#[derive(Debug)]
enum ProviderHandle {
    OpenAi(OpenAiCompatibleClient),
    Anthropic(AnthropicClient),
    OpenRouter(OpenAiCompatibleClient),
}

/// Unified chat client over the supported providers.
#[derive(Debug)]
pub struct LlmClient {
    provider: ProviderId,
    model: String,
    max_tokens: u32,
    handle: ProviderHandle,
}

impl LlmClient {
    /// Construct from the effective on-disk configuration.
    pub fn new(provider: Option<ProviderId>) -> Result<Self> {
        Self::with_config(Config::load_effective(), provider)
    }

    /// Construct from an explicit configuration value.
    ///
    /// `provider` overrides the config's default provider. Fails fast when no
    /// provider has a resolvable key, or when the selected one doesn't.
    pub fn with_config(config: Config, provider: Option<ProviderId>) -> Result<Self> {
        Self::with_config_and_env(config, provider, &process_env)
    }

    fn with_config_and_env(
        config: Config,
        provider: Option<ProviderId>,
        env: EnvLookup,
    ) -> Result<Self> {
        let provider = provider.unwrap_or(config.provider);

        let keyed: Vec<ProviderId> = ProviderId::ALL
            .into_iter()
            .filter(|p| resolve_api_key_with(env, &config, *p).is_some())
            .collect();
        if keyed.is_empty() {
            return Err(LlmError::NoApiKeys);
        }
        let Some(api_key) = resolve_api_key_with(env, &config, provider) else {
            return Err(LlmError::MissingApiKey {
                provider,
                env_var: provider.env_var(),
                alternatives: keyed,
            });
        };

        let http = reqwest::Client::new();
        let handle = match provider {
            ProviderId::OpenAi => {
                ProviderHandle::OpenAi(OpenAiCompatibleClient::openai(http, api_key))
            }
            ProviderId::Anthropic => {
                ProviderHandle::Anthropic(AnthropicClient::new(http, api_key))
            }
            ProviderId::OpenRouter => {
                ProviderHandle::OpenRouter(OpenAiCompatibleClient::openrouter(http, api_key))
            }
        };

        log::debug!("initialized {} client (model {})", provider, config.model(provider));

        Ok(Self {
            provider,
            model: config.model(provider).to_string(),
            max_tokens: config.max_tokens(provider),
            handle,
        })
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Send a chat request and wait for the complete response text.
    pub async fn chat(&self, system_prompt: &str, user_message: &str) -> Result<String> {
        match &self.handle {
            ProviderHandle::OpenAi(c) => {
                c.chat(&self.model, self.max_tokens, system_prompt, user_message)
                    .await
            }
            ProviderHandle::Anthropic(c) => {
                c.chat(&self.model, self.max_tokens, system_prompt, user_message)
                    .await
            }
            // The OpenRouter integration only supports streaming; fail before
            // any network attempt.
            ProviderHandle::OpenRouter(_) => Err(LlmError::StreamingOnly(self.provider)),
        }
    }

    /// Send a chat request, yielding response fragments as they arrive.
    /// Concatenating the fragments in yield order gives the complete response.
    pub async fn stream_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<ChatStream> {
        match &self.handle {
            ProviderHandle::OpenAi(c) | ProviderHandle::OpenRouter(c) => {
                c.stream_chat(&self.model, self.max_tokens, system_prompt, user_message)
                    .await
            }
            ProviderHandle::Anthropic(c) => {
                c.stream_chat(&self.model, self.max_tokens, system_prompt, user_message)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_pairs(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        }
    }

    fn empty_config() -> Config {
        Config::from_toml("").unwrap()
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("openai".parse::<ProviderId>().unwrap(), ProviderId::OpenAi);
        assert_eq!("Anthropic".parse::<ProviderId>().unwrap(), ProviderId::Anthropic);
        assert_eq!("openrouter".parse::<ProviderId>().unwrap(), ProviderId::OpenRouter);
    }

    #[test]
    fn test_unsupported_provider() {
        let err = "invalid_provider".parse::<ProviderId>().unwrap_err();
        assert!(err.to_string().contains("Unsupported provider: invalid_provider"));
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(ProviderId::OpenAi.env_var(), "OPENAI_API_KEY");
        assert_eq!(ProviderId::Anthropic.env_var(), "ANTHROPIC_API_KEY");
        assert_eq!(ProviderId::OpenRouter.env_var(), "OPENROUTER_API_KEY");
    }

    #[test]
    fn test_env_wins_over_config_key() {
        let mut config = empty_config();
        config.anthropic.api_key = Some("B".to_string());
        let env = env_pairs(&[("ANTHROPIC_API_KEY", "A")]);
        let key = resolve_api_key_with(&env, &config, ProviderId::Anthropic);
        assert_eq!(key.as_deref(), Some("A"));
    }

    #[test]
    fn test_config_key_when_env_absent() {
        let mut config = empty_config();
        config.openai.api_key = Some("sk-user-config-key".to_string());
        let key = resolve_api_key_with(&no_env, &config, ProviderId::OpenAi);
        assert_eq!(key.as_deref(), Some("sk-user-config-key"));
    }

    #[test]
    fn test_empty_env_value_counts_as_unset() {
        let config = empty_config();
        let env = env_pairs(&[("OPENAI_API_KEY", "")]);
        assert!(resolve_api_key_with(&env, &config, ProviderId::OpenAi).is_none());
    }

    #[test]
    fn test_no_keys_anywhere_gives_unified_error() {
        let err =
            LlmClient::with_config_and_env(empty_config(), None, &no_env).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No API keys found"));
        assert!(msg.to_lowercase().contains("at least one"));
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.contains("ANTHROPIC_API_KEY"));
        assert!(msg.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_all_empty_records_give_unified_error() {
        let config = Config::from_toml("[openai]\n[anthropic]\n[openrouter]\n").unwrap();
        let err = LlmClient::with_config_and_env(config, None, &no_env).unwrap_err();
        assert!(err.to_string().contains("No API keys found"));
    }

    #[test]
    fn test_selected_provider_missing_key_suggests_alternative() {
        let env = env_pairs(&[("ANTHROPIC_API_KEY", "test-key-12345")]);
        let err = LlmClient::with_config_and_env(
            empty_config(),
            Some(ProviderId::OpenAi),
            &env,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.to_lowercase().contains("not set"));
        assert!(msg.to_lowercase().contains("--provider anthropic"));
    }

    #[test]
    fn test_missing_key_suggests_every_keyed_alternative() {
        let env = env_pairs(&[
            ("OPENAI_API_KEY", "k1"),
            ("OPENROUTER_API_KEY", "k2"),
        ]);
        let err = LlmClient::with_config_and_env(
            empty_config(),
            Some(ProviderId::Anthropic),
            &env,
        )
        .unwrap_err();
        let msg = err.to_string().to_lowercase();
        assert!(msg.contains("--provider openai"));
        assert!(msg.contains("--provider openrouter"));
    }

    #[test]
    fn test_each_provider_constructs_from_its_env_var_alone() {
        for provider in ProviderId::ALL {
            let env = env_pairs(&[(provider.env_var(), "test-key-12345")]);
            let client = LlmClient::with_config_and_env(
                empty_config(),
                Some(provider),
                &env,
            )
            .unwrap();
            assert_eq!(client.provider(), provider);
        }
    }

    #[test]
    fn test_override_beats_config_default_provider() {
        let config = Config::from_toml("provider = \"anthropic\"\n").unwrap();
        let env = env_pairs(&[("OPENAI_API_KEY", "x")]);
        let client =
            LlmClient::with_config_and_env(config, Some(ProviderId::OpenAi), &env).unwrap();
        assert_eq!(client.provider(), ProviderId::OpenAi);
    }

    #[test]
    fn test_config_drives_provider_model_and_max_tokens() {
        let config = Config::from_toml(
            "provider = \"anthropic\"\n\n[anthropic]\napi_key = \"k\"\nmodel = \"m\"\nmax_tokens = 100\n",
        )
        .unwrap();
        let client = LlmClient::with_config_and_env(config, None, &no_env).unwrap();
        assert_eq!(client.provider(), ProviderId::Anthropic);
        assert_eq!(client.model(), "m");
        assert_eq!(client.max_tokens(), 100);
    }

    #[test]
    fn test_unset_fields_fall_back_to_defaults() {
        let mut config = empty_config();
        config.openai.api_key = Some("k".to_string());
        let client =
            LlmClient::with_config_and_env(config, Some(ProviderId::OpenAi), &no_env).unwrap();
        assert_eq!(client.model(), ProviderId::OpenAi.default_model());
        assert_eq!(client.max_tokens(), 3000);
    }

    #[tokio::test]
    async fn test_openrouter_non_streaming_chat_is_rejected() {
        let mut config = empty_config();
        config.openrouter.api_key = Some("k".to_string());
        let client = LlmClient::with_config_and_env(
            config,
            Some(ProviderId::OpenRouter),
            &no_env,
        )
        .unwrap();
        let err = client.chat("system", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::StreamingOnly(ProviderId::OpenRouter)));
        assert!(err.to_string().contains("streaming"));
    }
}
