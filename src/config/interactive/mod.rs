#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::{Config, get_config_dir};
use crate::cache::{MemoryCache, ObjectCache};
use crate::credentials::ApiKeyStore;
use crate::embeddings::openai::{KeyValidation, OpenAiClient};

/// Guided first-run setup: search settings, then API key entry with a live
/// validation round-trip before anything is persisted.
#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("Semantic Search Setup").bold().cyan());
    eprintln!();

    let config_dir = get_config_dir()?;
    let mut config = Config::load(&config_dir)?;

    eprintln!("{}", style("Search Settings").bold().yellow());

    let types_input: String = Input::new()
        .with_prompt("Indexed document types (comma separated)")
        .default(config.search.indexed_types.join(", "))
        .interact_text()?;
    let parsed_types = parse_types_input(&types_input);
    if !parsed_types.is_empty() {
        config.search.indexed_types = parsed_types;
    }

    config.search.similarity_threshold = Input::new()
        .with_prompt("Similarity threshold (0-1)")
        .default(config.search.similarity_threshold)
        .validate_with(|value: &f32| -> Result<(), &str> {
            if (0.0..=1.0).contains(value) {
                Ok(())
            } else {
                Err("threshold must be between 0 and 1")
            }
        })
        .interact_text()?;

    config.search.fallback_enabled = Confirm::new()
        .with_prompt("Fall back to keyword search when semantic search is unavailable?")
        .default(config.search.fallback_enabled)
        .interact()?;

    eprintln!();
    eprintln!("{}", style("Provider Credential").bold().yellow());

    let credentials = ApiKeyStore::new(&config_dir);
    let key_prompt = if credentials.is_configured() {
        "API key (leave empty to keep the current one)"
    } else {
        "API key"
    };

    let api_key = Password::new()
        .with_prompt(key_prompt)
        .allow_empty_password(true)
        .interact()?;

    if !api_key.is_empty() {
        eprintln!("{}", style("Validating key against the provider...").dim());

        let cache: Arc<dyn ObjectCache> = Arc::new(MemoryCache::new());
        let client = OpenAiClient::new(&config.provider, credentials.clone(), cache)?;

        match client.validate_api_key(&api_key) {
            KeyValidation::Valid => {
                credentials
                    .store_api_key(&api_key)
                    .context("Failed to store API key")?;
                eprintln!("{}", style("Key validated and stored.").green());
            }
            KeyValidation::InvalidFormat(message) | KeyValidation::InvalidCredential(message) => {
                eprintln!("{} {}", style("Key rejected:").red(), message);
            }
            KeyValidation::ConnectionError(message) => {
                eprintln!("{} {}", style("Could not validate:").yellow(), message);
                if Confirm::new()
                    .with_prompt("Store the key anyway?")
                    .default(false)
                    .interact()?
                {
                    credentials
                        .store_api_key(&api_key)
                        .context("Failed to store API key")?;
                    eprintln!("{}", style("Key stored without validation.").yellow());
                }
            }
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("Configuration saved.").green());
        eprintln!(
            "Configuration file: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;
    let credentials = ApiKeyStore::new(&config_dir);

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.provider.endpoint).cyan());
    eprintln!("  Model: {}", style(&config.provider.model).cyan());
    eprintln!(
        "  Dimensions: {}",
        style(config.provider.dimensions).cyan()
    );
    match credentials.get_api_key() {
        Ok(Some(key)) => eprintln!("  API key: {}", style(ApiKeyStore::mask(&key)).cyan()),
        _ => eprintln!("  API key: {}", style("not configured").red()),
    }

    eprintln!();
    eprintln!("{}", style("Search:").bold().yellow());
    eprintln!(
        "  Indexed types: {}",
        style(config.search.indexed_types.join(", ")).cyan()
    );
    eprintln!(
        "  Similarity threshold: {}",
        style(config.search.similarity_threshold).cyan()
    );
    eprintln!(
        "  Keyword fallback: {}",
        style(config.search.fallback_enabled).cyan()
    );
    eprintln!(
        "  Results per page: {}",
        style(config.search.per_page).cyan()
    );
    eprintln!(
        "  Monthly search limit: {}",
        style(config.search.monthly_search_limit).cyan()
    );
    eprintln!(
        "  Index size limit: {}",
        style(config.search.index_limit).cyan()
    );

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Database: {}", style(config.database_path().display()).dim());

    Ok(())
}

fn parse_types_input(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}
