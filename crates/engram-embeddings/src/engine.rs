//! EmbeddingEngine: the entry point for engram-embeddings.
//!
//! Coordinates the cache tiers, token truncation, retry policy and the
//! configured provider. Implements `IEmbeddingProvider` so it can be
//! used anywhere a provider is expected.

use std::path::Path;

use engram_core::config::EmbeddingConfig;
use engram_core::errors::{EmbeddingError, EngramError, EngramResult};
use engram_core::fingerprint::text_hash;
use engram_core::traits::IEmbeddingProvider;
use engram_observability::embedding_span;
use tracing::{debug, info};

use crate::cache::CacheCoordinator;
use crate::dimensions::{l2_normalize, validate_dimensions, validate_finite};
use crate::providers;
use crate::retry::RetryPolicy;
use crate::truncation::TokenTruncator;

/// One text waiting on the provider: result slot, cache key, truncated input.
struct PendingText {
    slot: usize,
    key: String,
    input: String,
}

pub struct EmbeddingEngine {
    provider: Box<dyn IEmbeddingProvider>,
    cache: CacheCoordinator,
    truncator: TokenTruncator,
    retry: RetryPolicy,
    dimensions: usize,
    batch_size: usize,
}

impl EmbeddingEngine {
    /// Build from configuration. `cache_path` enables the persistent tier.
    pub fn new(config: &EmbeddingConfig, cache_path: Option<&Path>) -> EngramResult<Self> {
        let provider = providers::create_provider(config)?;
        let cache = match cache_path {
            Some(path) => CacheCoordinator::open(config, path)?,
            None => CacheCoordinator::in_memory(config),
        };
        Self::with_provider(config, provider, cache)
    }

    /// Build around an explicit provider.
    ///
    /// # Errors
    /// A provider whose dimensionality disagrees with the config would mix
    /// dimensions in the corpus, so it is refused outright.
    pub fn with_provider(
        config: &EmbeddingConfig,
        provider: Box<dyn IEmbeddingProvider>,
        cache: CacheCoordinator,
    ) -> EngramResult<Self> {
        if provider.dimensions() != config.dimensions {
            return Err(EngramError::ConfigError(format!(
                "provider {} produces {}-d vectors, corpus requires {}",
                provider.name(),
                provider.dimensions(),
                config.dimensions
            )));
        }
        info!(
            provider = provider.name(),
            dims = config.dimensions,
            persistent_cache = cache.has_persistent_tier(),
            "EmbeddingEngine initialized"
        );
        Ok(Self {
            provider,
            cache,
            truncator: TokenTruncator::new(config.max_input_tokens),
            retry: RetryPolicy::from_config(config),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed one text, consulting the cache first.
    pub fn embed_text(&self, text: &str) -> EngramResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }
        let key = text_hash(text);
        if let (Some(vec), tier) = self.cache.get(&key) {
            debug!(tier = ?tier, "embedding served from cache");
            return Ok(vec);
        }

        let input = self.truncator.truncate(text);
        let raw = self
            .retry
            .run(self.provider.name(), || self.provider.embed(&input))?;
        let vec = self.finish(raw)?;
        self.cache.put(key, &vec);
        Ok(vec)
    }

    /// Embed many texts. One result per input, in input order.
    pub fn embed_texts(&self, texts: &[String]) -> Vec<EngramResult<Vec<f32>>> {
        let _span = embedding_span!(self.provider.name(), texts.len()).entered();

        let mut results: Vec<Option<EngramResult<Vec<f32>>>> =
            (0..texts.len()).map(|_| None).collect();
        let mut pending = Vec::new();
        for (slot, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results[slot] = Some(Err(EmbeddingError::EmptyInput.into()));
                continue;
            }
            let key = text_hash(text);
            match self.cache.get(&key) {
                (Some(vec), _) => results[slot] = Some(Ok(vec)),
                (None, _) => pending.push(PendingText {
                    slot,
                    key,
                    input: self.truncator.truncate(text),
                }),
            }
        }
        debug!(
            total = texts.len(),
            cache_misses = pending.len(),
            "embedding batch"
        );

        for chunk in pending.chunks(self.batch_size) {
            self.embed_chunk(chunk, &mut results);
        }

        results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    Err(EmbeddingError::InvalidResponse {
                        reason: "no result produced".to_string(),
                    }
                    .into())
                })
            })
            .collect()
    }

    /// Send one provider-sized chunk, retrying only the items that failed
    /// transiently.
    fn embed_chunk(
        &self,
        chunk: &[PendingText],
        results: &mut [Option<EngramResult<Vec<f32>>>],
    ) {
        let mut outstanding: Vec<&PendingText> = chunk.iter().collect();
        let mut last_error: Option<EngramError> = None;

        for attempt in 0..self.retry.max_attempts() {
            if attempt > 0 {
                std::thread::sleep(self.retry.delay_for(attempt));
            }
            let inputs: Vec<String> = outstanding.iter().map(|p| p.input.clone()).collect();
            let outputs = self.provider.embed_batch(&inputs);
            if outputs.len() != inputs.len() {
                for item in &outstanding {
                    results[item.slot] = Some(Err(EmbeddingError::InvalidResponse {
                        reason: format!(
                            "provider returned {} results for {} inputs",
                            outputs.len(),
                            inputs.len()
                        ),
                    }
                    .into()));
                }
                return;
            }

            let mut retry_next = Vec::new();
            for (item, output) in outstanding.into_iter().zip(outputs) {
                match output.and_then(|raw| self.finish(raw)) {
                    Ok(vec) => {
                        self.cache.put(item.key.clone(), &vec);
                        results[item.slot] = Some(Ok(vec));
                    }
                    Err(e) if e.is_transient() => {
                        last_error = Some(e);
                        retry_next.push(item);
                    }
                    Err(e) => results[item.slot] = Some(Err(e)),
                }
            }
            if retry_next.is_empty() {
                return;
            }
            outstanding = retry_next;
        }

        let attempts = self.retry.max_attempts();
        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        for item in outstanding {
            results[item.slot] = Some(Err(EmbeddingError::TemporarilyUnavailable {
                attempts,
                reason: reason.clone(),
            }
            .into()));
        }
    }

    fn finish(&self, mut raw: Vec<f32>) -> EngramResult<Vec<f32>> {
        validate_dimensions(&raw, self.dimensions)?;
        validate_finite(&raw)?;
        l2_normalize(&mut raw);
        Ok(raw)
    }
}

impl IEmbeddingProvider for EmbeddingEngine {
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        self.embed_text(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Vec<EngramResult<Vec<f32>>> {
        self.embed_texts(texts)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        self.provider.name()
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
