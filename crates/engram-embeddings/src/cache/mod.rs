//! Two-tier embedding cache: L1 (moka in-memory) then L2 (SQLite persistent).
//! Write-through on miss; L2 hits are promoted into L1.

pub mod l1_memory;
pub mod l2_sqlite;

use std::path::Path;
use std::time::Duration;

pub use l1_memory::L1MemoryCache;
pub use l2_sqlite::L2SqliteCache;

use engram_core::config::EmbeddingConfig;
use engram_core::errors::EngramResult;
use tracing::{debug, warn};

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHitTier {
    L1,
    L2,
    Miss,
}

/// Orchestrates lookups across both tiers.
pub struct CacheCoordinator {
    l1: L1MemoryCache,
    l2: Option<L2SqliteCache>,
}

impl CacheCoordinator {
    /// Memory-only cache.
    pub fn in_memory(config: &EmbeddingConfig) -> Self {
        Self {
            l1: L1MemoryCache::new(
                config.l1_cache_size,
                Duration::from_secs(config.l1_cache_tti_secs),
            ),
            l2: None,
        }
    }

    /// L1 plus a persistent L2 at `path` when the config enables it.
    pub fn open(config: &EmbeddingConfig, path: &Path) -> EngramResult<Self> {
        let mut cache = Self::in_memory(config);
        if config.l2_cache_enabled {
            cache.l2 = Some(L2SqliteCache::open(path)?);
        }
        Ok(cache)
    }

    /// Look up an embedding. L2 failures are logged and treated as misses.
    pub fn get(&self, key: &str) -> (Option<Vec<f32>>, CacheHitTier) {
        if let Some(vec) = self.l1.get(key) {
            debug!(key, tier = "L1", "cache hit");
            return (Some(vec), CacheHitTier::L1);
        }
        if let Some(l2) = &self.l2 {
            match l2.get(key) {
                Ok(Some(vec)) => {
                    debug!(key, tier = "L2", "cache hit");
                    self.l1.insert(key.to_string(), vec.clone());
                    return (Some(vec), CacheHitTier::L2);
                }
                Ok(None) => {}
                Err(e) => warn!(key, error = %e, "L2 cache read failed"),
            }
        }
        (None, CacheHitTier::Miss)
    }

    /// Write through to both tiers.
    pub fn put(&self, key: String, embedding: &[f32]) {
        if let Some(l2) = &self.l2 {
            if let Err(e) = l2.insert(&key, embedding) {
                warn!(key = %key, error = %e, "L2 cache write failed");
            }
        }
        self.l1.insert(key, embedding.to_vec());
    }

    pub fn has_persistent_tier(&self) -> bool {
        self.l2.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_hit_promotes_to_l1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let config = EmbeddingConfig::default();
        {
            let cache = CacheCoordinator::open(&config, &path).unwrap();
            cache.put("k".into(), &[1.0, 0.0]);
        }
        let cache = CacheCoordinator::open(&config, &path).unwrap();
        assert_eq!(cache.get("k").1, CacheHitTier::L2);
        assert_eq!(cache.get("k").1, CacheHitTier::L1);
    }

    #[test]
    fn memory_only_misses_after_restart() {
        let config = EmbeddingConfig::default();
        let cache = CacheCoordinator::in_memory(&config);
        assert_eq!(cache.get("k"), (None, CacheHitTier::Miss));
        cache.put("k".into(), &[1.0]);
        assert_eq!(cache.get("k"), (Some(vec![1.0]), CacheHitTier::L1));
        assert!(!cache.has_persistent_tier());
    }
}
