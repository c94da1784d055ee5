//! Interactive configuration setup for the `init` subcommand.

use anyhow::{Context, Result};
use llm_client::{Config, DEFAULT_MAX_TOKENS, ProviderId};
use std::io::{self, Write};

fn provider_label(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAi => "OpenAI",
        ProviderId::Anthropic => "Anthropic",
        ProviderId::OpenRouter => "OpenRouter",
    }
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        print!("{}: ", prompt);
    } else {
        print!("{} [{}]: ", prompt, default);
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok(if input.is_empty() {
        default.to_string()
    } else {
        input.to_string()
    })
}

/// Like `prompt_with_default`, but an existing value is shown masked.
fn prompt_secret_with_default(prompt: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        return prompt_with_default(prompt, "");
    }
    print!("{} [****]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok(if input.is_empty() {
        default.to_string()
    } else {
        input.to_string()
    })
}

fn configure_provider(config: &mut Config, provider: ProviderId) -> Result<()> {
    let settings = config.settings_mut(provider);
    let existing_key = settings.api_key.clone().unwrap_or_default();
    let existing_model = settings
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());

    let api_key = prompt_secret_with_default(
        &format!("Enter your {} API key", provider_label(provider)),
        &existing_key,
    )?;
    let model = prompt_with_default("Model", &existing_model)?;

    if !api_key.is_empty() {
        settings.api_key = Some(api_key);
    }
    settings.model = Some(model);
    if settings.max_tokens.is_none() {
        settings.max_tokens = Some(DEFAULT_MAX_TOKENS);
    }
    Ok(())
}

/// Run the interactive configuration setup and persist the result.
pub fn run_init() -> Result<()> {
    println!();
    println!("YouTube Summariser Configuration");
    println!("{}", "=".repeat(34));
    println!();

    let existing = Config::load_user();
    let existing_provider = existing
        .as_ref()
        .map(|c| c.provider)
        .unwrap_or(ProviderId::Anthropic);

    println!("Which LLM provider would you like to use by default?");
    println!("  1. anthropic (Recommended)");
    println!("  2. openai");
    println!("  3. openrouter");
    let default_choice = match existing_provider {
        ProviderId::Anthropic => "1",
        ProviderId::OpenAi => "2",
        ProviderId::OpenRouter => "3",
    };
    let selection = prompt_with_default("Select", default_choice)?;
    let provider = match selection.as_str() {
        "2" => ProviderId::OpenAi,
        "3" => ProviderId::OpenRouter,
        _ => ProviderId::Anthropic,
    };

    let mut config = existing.unwrap_or_default();
    config.provider = provider;

    println!();
    configure_provider(&mut config, provider)?;

    for other in ProviderId::ALL.into_iter().filter(|p| *p != provider) {
        println!();
        let answer = prompt_with_default(
            &format!(
                "Do you also want to configure {}? (y/N)",
                provider_label(other)
            ),
            "n",
        )?;
        if answer.eq_ignore_ascii_case("y") {
            println!();
            configure_provider(&mut config, other)?;
        }
    }

    config.save().context("Failed to save configuration")?;

    let path = Config::config_path()?;
    println!();
    println!("Configuration saved to {}", path.display());
    Ok(())
}
