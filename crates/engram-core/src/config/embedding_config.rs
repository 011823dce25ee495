use serde::{Deserialize, Serialize};

use super::defaults;

/// Embedding subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "http" or "hashed".
    pub provider: String,
    /// Endpoint for the HTTP provider.
    pub endpoint: Option<String>,
    /// Model identifier sent to the HTTP provider.
    pub model: String,
    /// Environment variable holding the provider API key.
    pub api_key_env: String,
    /// Dimensionality every vector in the corpus must have.
    pub dimensions: usize,
    /// Inputs are truncated to this many tokens before embedding.
    pub max_input_tokens: usize,
    /// Maximum texts per provider request.
    pub batch_size: usize,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// L1 in-memory cache capacity (entries).
    pub l1_cache_size: u64,
    pub l1_cache_tti_secs: u64,
    /// Enable the persistent L2 cache.
    pub l2_cache_enabled: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: defaults::DEFAULT_EMBEDDING_PROVIDER.to_string(),
            endpoint: None,
            model: defaults::DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key_env: defaults::DEFAULT_EMBEDDING_API_KEY_ENV.to_string(),
            dimensions: defaults::DEFAULT_EMBEDDING_DIMENSIONS,
            max_input_tokens: defaults::DEFAULT_MAX_INPUT_TOKENS,
            batch_size: defaults::DEFAULT_EMBEDDING_BATCH_SIZE,
            request_timeout_ms: defaults::DEFAULT_EMBEDDING_TIMEOUT_MS,
            max_retries: defaults::DEFAULT_EMBEDDING_MAX_RETRIES,
            initial_backoff_ms: defaults::DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: defaults::DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: defaults::DEFAULT_BACKOFF_MULTIPLIER,
            l1_cache_size: defaults::DEFAULT_L1_CACHE_SIZE,
            l1_cache_tti_secs: defaults::DEFAULT_L1_CACHE_TTI_SECS,
            l2_cache_enabled: defaults::DEFAULT_L2_CACHE_ENABLED,
        }
    }
}
