
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ObjectCache;
use crate::config::ProviderConfig;
use crate::credentials::ApiKeyStore;
use crate::embeddings::text::prepare_text;

/// Failures the embedding client can report. The caller decides whether to
/// retry or fall back; none of these are fatal to a search.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API key not configured")]
    NotConfigured,

    #[error("Cannot generate an embedding for empty text")]
    EmptyInput,

    #[error("Provider rejected the API key: {0}")]
    Unauthorized(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Unexpected provider response (status {status}): {message}")]
    UnknownProvider { status: u16, message: String },

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Outcome of validating an API key against the provider. Surfaced verbatim
/// to the caller; this is the one place the raw reason matters to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValidation {
    Valid,
    InvalidFormat(String),
    InvalidCredential(String),
    ConnectionError(String),
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
///
/// Successful responses are cached by (prepared text, model) through the
/// injected cache, so identical content does not trigger repeat calls within
/// the TTL. No HTTP-level retries: fallback policy lives with the caller.
#[derive(Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    model: String,
    dimensions: usize,
    cache_ttl: Duration,
    validation_timeout: Duration,
    credentials: ApiKeyStore,
    cache: Arc<dyn ObjectCache>,
    agent: ureq::Agent,
}

impl OpenAiClient {
    #[inline]
    pub fn new(
        config: &ProviderConfig,
        credentials: ApiKeyStore,
        cache: Arc<dyn ObjectCache>,
    ) -> Result<Self> {
        let endpoint =
            Url::parse(&config.endpoint).context("Invalid embedding provider endpoint")?;

        let agent = make_agent(Duration::from_secs(config.timeout_secs));

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            dimensions: config.dimensions as usize,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            validation_timeout: Duration::from_secs(config.validation_timeout_secs),
            credentials,
            cache,
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = make_agent(timeout);
        self
    }

    /// Embedding dimensionality of the active model.
    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Name of the active model, recorded with every stored vector.
    #[inline]
    pub fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn credentials(&self) -> &ApiKeyStore {
        &self.credentials
    }

    /// Embed text with the configured model.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_model(text, &self.model)
    }

    /// Embed text with an explicit model.
    #[inline]
    pub fn embed_with_model(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = match self.credentials.get_api_key() {
            Ok(Some(key)) => key,
            Ok(None) => return Err(EmbeddingError::NotConfigured),
            Err(e) => {
                warn!("Failed to read stored API key: {}", e);
                return Err(EmbeddingError::NotConfigured);
            }
        };

        let prepared = prepare_text(text);
        if prepared.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let cache_key = embed_cache_key(&prepared, model);
        if let Some(cached) = self.cache.get(&cache_key) {
            match serde_json::from_str::<Vec<f32>>(&cached) {
                Ok(vector) => {
                    debug!("Embedding cache hit ({} dimensions)", vector.len());
                    return Ok(vector);
                }
                Err(_) => self.cache.delete(&cache_key),
            }
        }

        let vector = self.request_embedding(&self.agent, &api_key, &prepared, model)?;

        if let Ok(encoded) = serde_json::to_string(&vector) {
            self.cache.set(&cache_key, encoded, self.cache_ttl);
        }

        debug!("Generated embedding with {} dimensions", vector.len());
        Ok(vector)
    }

    /// Validate an API key: format first, then a minimal live call.
    #[inline]
    pub fn validate_api_key(&self, api_key: &str) -> KeyValidation {
        if !valid_key_format(api_key) {
            return KeyValidation::InvalidFormat(
                "Invalid API key format. Keys start with \"sk-\".".to_string(),
            );
        }

        let agent = make_agent(self.validation_timeout);

        match self.request_embedding(&agent, api_key, "test", &self.model) {
            Ok(_) => KeyValidation::Valid,
            Err(EmbeddingError::Unauthorized(message)) => KeyValidation::InvalidCredential(message),
            Err(EmbeddingError::Transport(_)) => KeyValidation::ConnectionError(
                "Unable to connect to the embedding provider.".to_string(),
            ),
            Err(e) => KeyValidation::ConnectionError(e.to_string()),
        }
    }

    fn request_embedding(
        &self,
        agent: &ureq::Agent,
        api_key: &str,
        input: &str,
        model: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedRequest { input, model };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        let authorization = format!("Bearer {api_key}");
        let mut response = agent
            .post(self.endpoint.as_str())
            .header("Authorization", authorization.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        if status != 200 {
            return Err(parse_provider_error(status, &body));
        }

        let parsed: EmbedResponse = serde_json::from_str(&body).map_err(|_| {
            EmbeddingError::UnknownProvider {
                status,
                message: "Unexpected response structure from provider".to_string(),
            }
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::UnknownProvider {
                status,
                message: "Response contained no embedding".to_string(),
            })
    }
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn embed_cache_key(prepared: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prepared.as_bytes());
    hasher.update(model.as_bytes());
    format!("embed:{}", hex::encode(hasher.finalize()))
}

/// Keys look like `sk-...` or `sk-proj-...`: the `sk-` prefix followed by at
/// least 20 characters from `[A-Za-z0-9_-]`.
fn valid_key_format(api_key: &str) -> bool {
    match api_key.strip_prefix("sk-") {
        Some(rest) => {
            rest.chars().count() >= 20
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        None => false,
    }
}

fn parse_provider_error(status: u16, body: &str) -> EmbeddingError {
    let provider_message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message);

    match status {
        401 => EmbeddingError::Unauthorized(
            provider_message.unwrap_or_else(|| "Invalid API key.".to_string()),
        ),
        429 => EmbeddingError::RateLimited(
            provider_message.unwrap_or_else(|| "Rate limit exceeded.".to_string()),
        ),
        500..=599 => EmbeddingError::Provider {
            status,
            message: provider_message
                .unwrap_or_else(|| "Embedding provider service error.".to_string()),
        },
        _ => EmbeddingError::UnknownProvider {
            status,
            message: provider_message.unwrap_or_else(|| "Unknown provider error.".to_string()),
        },
    }
}
