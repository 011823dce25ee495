use serde::{Deserialize, Serialize};

use super::defaults;

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Buffered items are flushed at least this often.
    pub flush_interval_ms: u64,
    /// Buffered items are flushed once this many are waiting.
    pub flush_count: usize,
    /// Capacity of the worker's message queue.
    pub queue_capacity: usize,
    /// Failed embedding attempts after which an item is reported as
    /// temporarily unavailable. It stays queued and keeps being retried.
    pub max_item_attempts: u32,
    /// Upper bound on the pause between two attempts of a failing item.
    pub max_retry_delay_ms: u64,
    /// Reasoning traces deeper than this are refused.
    pub max_reasoning_depth: u32,
    /// Reasoning traces accepted per conversation per minute.
    pub reasoning_per_minute: u32,
    /// Capacity of the access-telemetry channel.
    pub telemetry_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: defaults::DEFAULT_FLUSH_INTERVAL_MS,
            flush_count: defaults::DEFAULT_FLUSH_COUNT,
            queue_capacity: defaults::DEFAULT_QUEUE_CAPACITY,
            max_item_attempts: defaults::DEFAULT_MAX_ITEM_ATTEMPTS,
            max_retry_delay_ms: defaults::DEFAULT_MAX_RETRY_DELAY_MS,
            max_reasoning_depth: defaults::DEFAULT_MAX_REASONING_DEPTH,
            reasoning_per_minute: defaults::DEFAULT_REASONING_PER_MINUTE,
            telemetry_capacity: defaults::DEFAULT_TELEMETRY_CAPACITY,
        }
    }
}
