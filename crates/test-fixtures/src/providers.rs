//! Embedding providers with scripted behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use engram_core::errors::{EmbeddingError, EngramResult};
use engram_core::fingerprint::normalize_text;
use engram_core::traits::IEmbeddingProvider;

/// Returns registered vectors for known texts and a deterministic hashed
/// bag-of-words vector for anything else.
pub struct TableProvider {
    dims: usize,
    table: Mutex<HashMap<String, Vec<f32>>>,
}

impl TableProvider {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.insert(text, vector);
        self
    }

    pub fn insert(&self, text: &str, vector: Vec<f32>) {
        if let Ok(mut table) = self.table.lock() {
            table.insert(normalize_text(text), vector);
        }
    }

    fn hashed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut h: u64 = 0xcbf2_9ce4_8422_2325;
            for b in word.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
            v[(h as usize) % self.dims] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl IEmbeddingProvider for TableProvider {
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        let key = normalize_text(text);
        if key.is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }
        let known = self
            .table
            .lock()
            .ok()
            .and_then(|table| table.get(&key).cloned());
        Ok(known.unwrap_or_else(|| self.hashed(text)))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "table"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Wraps a provider and injects failures.
pub struct FlakyProvider {
    inner: Box<dyn IEmbeddingProvider>,
    transient_failures: AtomicU32,
    always_transient: AtomicBool,
    poison: Vec<String>,
    wrong_dims_for: Vec<String>,
    calls: AtomicUsize,
}

impl FlakyProvider {
    pub fn new(inner: impl IEmbeddingProvider + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            transient_failures: AtomicU32::new(0),
            always_transient: AtomicBool::new(false),
            poison: Vec::new(),
            wrong_dims_for: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// The next `n` calls fail with a rate limit.
    pub fn rate_limited_for(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Texts containing `needle` are rejected permanently.
    pub fn rejecting(mut self, needle: &str) -> Self {
        self.poison.push(needle.to_string());
        self
    }

    /// Texts containing `needle` come back with the wrong dimensionality.
    pub fn wrong_dims_for(mut self, needle: &str) -> Self {
        self.wrong_dims_for.push(needle.to_string());
        self
    }

    /// Every call fails transiently until [`FlakyProvider::recover`].
    pub fn set_down(&self, down: bool) {
        self.always_transient.store(down, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.set_down(false);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_transient(&self) -> bool {
        if self.always_transient.load(Ordering::SeqCst) {
            return true;
        }
        self.transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl IEmbeddingProvider for FlakyProvider {
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.take_transient() {
            return Err(EmbeddingError::RateLimited {
                provider: "flaky".into(),
            }
            .into());
        }
        if self.poison.iter().any(|p| text.contains(p.as_str())) {
            return Err(EmbeddingError::Rejected {
                provider: "flaky".into(),
                status: 400,
                reason: "poisoned input".into(),
            }
            .into());
        }
        if self.wrong_dims_for.iter().any(|p| text.contains(p.as_str())) {
            return Ok(vec![0.5; self.inner.dimensions() + 1]);
        }
        self.inner.embed(text)
    }

    /// A rate limit applies to the whole request, like a real provider.
    fn embed_batch(&self, texts: &[String]) -> Vec<EngramResult<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.take_transient() {
            return texts
                .iter()
                .map(|_| {
                    Err(EmbeddingError::RateLimited {
                        provider: "flaky".into(),
                    }
                    .into())
                })
                .collect();
        }
        texts
            .iter()
            .map(|t| {
                if self.poison.iter().any(|p| t.contains(p.as_str())) {
                    Err(EmbeddingError::Rejected {
                        provider: "flaky".into(),
                        status: 400,
                        reason: "poisoned input".into(),
                    }
                    .into())
                } else if self.wrong_dims_for.iter().any(|p| t.contains(p.as_str())) {
                    Ok(vec![0.5; self.inner.dimensions() + 1])
                } else {
                    self.inner.embed(t)
                }
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "flaky"
    }

    fn is_available(&self) -> bool {
        !self.always_transient.load(Ordering::SeqCst)
    }
}
