#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Embedding provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub model: String,
    pub dimensions: u32,
    pub timeout_secs: u64,
    pub validation_timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Default for ProviderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSION,
            timeout_secs: 30,
            validation_timeout_secs: 10,
            cache_ttl_secs: 3600,
        }
    }
}

/// Search and indexing behavior, including the advisory usage quotas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub indexed_types: Vec<String>,
    pub per_page: u32,
    pub similarity_threshold: f32,
    pub fallback_enabled: bool,
    pub max_results: u32,
    pub monthly_search_limit: u32,
    pub index_limit: u32,
}

impl Default for SearchConfig {
    #[inline]
    fn default() -> Self {
        Self {
            indexed_types: vec!["post".to_string(), "page".to_string()],
            per_page: 10,
            similarity_threshold: 0.5,
            fallback_enabled: true,
            max_results: 100,
            monthly_search_limit: 1000,
            index_limit: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid request timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid validation timeout: {0} (must be between 1 and 60 seconds)")]
    InvalidValidationTimeout(u64),
    #[error("Invalid cache TTL: {0} (must be at most 86400 seconds)")]
    InvalidCacheTtl(u64),
    #[error("At least one indexed document type is required")]
    NoIndexedTypes,
    #[error("Invalid results per page: {0} (must be between 1 and 100)")]
    InvalidPerPage(u32),
    #[error("Invalid similarity threshold: {0} (must be between 0 and 1)")]
    InvalidThreshold(f32),
    #[error("Invalid max results: {0} (must be between 10 and 500)")]
    InvalidMaxResults(u32),
    #[error("Invalid monthly search limit: {0} (must be at least 1)")]
    InvalidSearchLimit(u32),
    #[error("Invalid index size limit: {0} (must be at least 1)")]
    InvalidIndexLimit(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                provider: ProviderConfig::default(),
                search: SearchConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Path of the SQLite database holding embeddings, analytics, and counters.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("semsearch.db")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

impl ProviderConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.dimensions) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimensions));
        }

        if !(1..=300).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if !(1..=60).contains(&self.validation_timeout_secs) {
            return Err(ConfigError::InvalidValidationTimeout(
                self.validation_timeout_secs,
            ));
        }

        if self.cache_ttl_secs > 86400 {
            return Err(ConfigError::InvalidCacheTtl(self.cache_ttl_secs));
        }

        Ok(())
    }
}

impl SearchConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexed_types.is_empty()
            || self.indexed_types.iter().any(|t| t.trim().is_empty())
        {
            return Err(ConfigError::NoIndexedTypes);
        }

        if !(1..=100).contains(&self.per_page) {
            return Err(ConfigError::InvalidPerPage(self.per_page));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidThreshold(self.similarity_threshold));
        }

        if !(10..=500).contains(&self.max_results) {
            return Err(ConfigError::InvalidMaxResults(self.max_results));
        }

        if self.monthly_search_limit == 0 {
            return Err(ConfigError::InvalidSearchLimit(self.monthly_search_limit));
        }

        if self.index_limit == 0 {
            return Err(ConfigError::InvalidIndexLimit(self.index_limit));
        }

        Ok(())
    }
}

/// Per-user configuration directory for the engine.
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("semsearch"))
        .context("Could not determine the user configuration directory")
}
