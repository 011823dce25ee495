//! HTTP embedding provider.
//!
//! Posts `{model, input}` to an OpenAI-compatible endpoint and reads
//! `{data: [{embedding, index}]}`. Classifies failures so the engine can
//! tell rate limits and timeouts (transient) from rejected input
//! (permanent for the item).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use engram_core::config::EmbeddingConfig;
use engram_core::errors::{EmbeddingError, EngramResult};
use engram_core::traits::IEmbeddingProvider;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub struct HttpProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    timeout: Duration,
    // Built on first use: the blocking client must not be created on an
    // async executor thread.
    client: OnceLock<reqwest::blocking::Client>,
    available: AtomicBool,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl HttpProvider {
    pub fn from_config(config: &EmbeddingConfig) -> EngramResult<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| EmbeddingError::ProviderUnavailable {
                provider: "http (no endpoint configured)".to_string(),
            })?;
        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            dimensions: config.dimensions,
            timeout: Duration::from_millis(config.request_timeout_ms),
            client: OnceLock::new(),
            available: AtomicBool::new(true),
        })
    }

    fn client(&self) -> EngramResult<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .gzip(true)
            .build()
            .map_err(|e| EmbeddingError::Network {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.client.get_or_init(|| client))
    }

    /// One request, no retry. Retry policy lives in the engine.
    fn request(&self, texts: &[String]) -> EngramResult<Vec<Vec<f32>>> {
        let mut req = self
            .client()?
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().map_err(|e| self.classify_transport(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let parsed: EmbedResponse =
            response
                .json()
                .map_err(|e| EmbeddingError::InvalidResponse {
                    reason: format!("JSON parse error: {e}"),
                })?;
        self.available.store(true, Ordering::Relaxed);
        order_by_index(parsed.data, texts.len())
    }

    fn classify_transport(&self, e: reqwest::Error) -> engram_core::EngramError {
        warn!(provider = self.name(), error = %e, "embedding request failed");
        if e.is_timeout() {
            EmbeddingError::Timeout {
                provider: self.name().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
            .into()
        } else {
            self.available.store(!e.is_connect(), Ordering::Relaxed);
            EmbeddingError::Network {
                provider: self.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        }
    }

    fn classify_status(&self, status: StatusCode, body: String) -> engram_core::EngramError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            EmbeddingError::RateLimited {
                provider: self.name().to_string(),
            }
            .into()
        } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            EmbeddingError::Network {
                provider: self.name().to_string(),
                reason: format!("server returned {status}"),
            }
            .into()
        } else {
            EmbeddingError::Rejected {
                provider: self.name().to_string(),
                status: status.as_u16(),
                reason: body.chars().take(200).collect(),
            }
            .into()
        }
    }
}

fn order_by_index(data: Vec<EmbedData>, expected: usize) -> EngramResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse {
            reason: format!("expected {expected} embeddings, got {}", data.len()),
        }
        .into());
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, d) in data.into_iter().enumerate() {
        let idx = d.index.unwrap_or(pos);
        match slots.get_mut(idx) {
            Some(slot) if slot.is_none() => *slot = Some(d.embedding),
            _ => {
                return Err(EmbeddingError::InvalidResponse {
                    reason: format!("bad or repeated index {idx}"),
                }
                .into())
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

impl IEmbeddingProvider for HttpProvider {
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        let mut out = self.request(&[text.to_string()])?;
        out.pop().ok_or_else(|| {
            EmbeddingError::InvalidResponse {
                reason: "empty response".to_string(),
            }
            .into()
        })
    }

    /// A request-level failure applies to every item of the request.
    fn embed_batch(&self, texts: &[String]) -> Vec<EngramResult<Vec<f32>>> {
        match self.request(texts) {
            Ok(vectors) => vectors.into_iter().map(Ok).collect(),
            Err(e) => {
                let transient = e.is_transient();
                let message = e.to_string();
                texts
                    .iter()
                    .map(|_| {
                        Err(if transient {
                            EmbeddingError::Network {
                                provider: self.name().to_string(),
                                reason: message.clone(),
                            }
                            .into()
                        } else {
                            EmbeddingError::InvalidResponse {
                                reason: message.clone(),
                            }
                            .into()
                        })
                    })
                    .collect()
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "http"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}
