//! Structured log events for key engine operations.
//!
//! Each function emits a `tracing` event with an `event` field so log
//! pipelines can key on it.

pub fn node_ingested(node_id: &str, conversation_id: &str, cluster: Option<u32>) {
    tracing::debug!(
        event = "node_ingested",
        node_id = %node_id,
        conversation_id = %conversation_id,
        cluster = ?cluster,
        "node buffered"
    );
}

pub fn duplicate_dropped(node_id: &str, existing_id: &str) {
    tracing::debug!(
        event = "duplicate_dropped",
        node_id = %node_id,
        existing_id = %existing_id,
        "duplicate content dropped"
    );
}

pub fn item_deferred(node_id: &str, attempt: u32, reason: &str) {
    tracing::warn!(
        event = "item_deferred",
        node_id = %node_id,
        attempt = attempt,
        reason = %reason,
        "item queued for retry"
    );
}

pub fn item_unavailable(node_id: &str, attempts: u32, retry_in_ms: u128, reason: &str) {
    tracing::error!(
        event = "item_unavailable",
        node_id = %node_id,
        attempts = attempts,
        retry_in_ms = retry_in_ms,
        reason = %reason,
        "embedding provider temporarily unavailable, item kept queued"
    );
}

pub fn item_rejected(node_id: &str, class: &str, reason: &str) {
    tracing::warn!(
        event = "item_rejected",
        node_id = %node_id,
        class = %class,
        reason = %reason,
        "item rejected"
    );
}

pub fn flush_completed(nodes: usize, episodes: usize, corpus_version: u64, elapsed_ms: u128) {
    tracing::info!(
        event = "flush_completed",
        nodes = nodes,
        episodes = episodes,
        corpus_version = corpus_version,
        elapsed_ms = elapsed_ms as u64,
        "flush completed"
    );
}

pub fn unauthorized_query(query_len: usize) {
    tracing::warn!(
        event = "unauthorized_query",
        query_len = query_len,
        "query without authorization scope refused"
    );
}

pub fn partial_result(completed_lanes: &[&str], timeout_ms: u64) {
    tracing::warn!(
        event = "partial_result",
        completed_lanes = ?completed_lanes,
        timeout_ms = timeout_ms,
        "query timed out, returning partial results"
    );
}

pub fn index_rebuilt(index: &str, reason: &str) {
    tracing::warn!(
        event = "index_rebuilt",
        index = %index,
        reason = %reason,
        "derived index rebuilt from corpus"
    );
}

pub fn recluster_completed(trigger: &str, clusters: usize, noise: usize, promoted: usize) {
    tracing::info!(
        event = "recluster_completed",
        trigger = %trigger,
        clusters = clusters,
        noise = noise,
        promoted = promoted,
        "batch recluster installed"
    );
}

pub fn reasoning_throttled(conversation_id: &str, depth: u32, reason: &str) {
    tracing::info!(
        event = "reasoning_throttled",
        conversation_id = %conversation_id,
        depth = depth,
        reason = %reason,
        "reasoning trace not re-ingested"
    );
}

pub fn engine_halted(reason: &str) {
    tracing::error!(event = "engine_halted", reason = %reason, "ingestion halted");
}
