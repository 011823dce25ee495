//! Bounds on reasoning traces re-entering the corpus.
//!
//! A trace deeper than the limit is refused outright; a conversation that
//! offers more traces per minute than allowed is throttled. Both keep the
//! reasoning loop from feeding on its own output.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use engram_core::errors::{EngramResult, IngestionError};
use engram_core::models::ReasoningTrace;
use engram_observability::tracing_setup::events;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

/// Depth limit plus a fixed one-minute window per conversation. Shared by
/// every handle clone.
#[derive(Debug)]
pub struct ReasoningGuard {
    max_depth: u32,
    per_minute: u32,
    windows: DashMap<String, Window>,
}

impl ReasoningGuard {
    pub fn new(max_depth: u32, per_minute: u32) -> Self {
        Self {
            max_depth,
            per_minute,
            windows: DashMap::new(),
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Refuse traces past the depth limit.
    pub fn check_depth(&self, conversation_id: &str, depth: u32) -> EngramResult<()> {
        if depth > self.max_depth {
            events::reasoning_throttled(conversation_id, depth, "depth limit");
            return Err(IngestionError::ReasoningTooDeep {
                depth,
                limit: self.max_depth,
            }
            .into());
        }
        Ok(())
    }

    /// Check depth, then take one slot of the conversation's window.
    pub fn check(&self, trace: &ReasoningTrace) -> EngramResult<()> {
        self.check_at(trace, Instant::now())
    }

    fn check_at(&self, trace: &ReasoningTrace, now: Instant) -> EngramResult<()> {
        self.check_depth(&trace.conversation_id, trace.depth)?;

        let mut window = self
            .windows
            .entry(trace.conversation_id.clone())
            .or_insert(Window { start: now, count: 0 });
        if now.duration_since(window.start) >= WINDOW {
            *window = Window { start: now, count: 0 };
        }
        if window.count >= self.per_minute {
            drop(window);
            events::reasoning_throttled(&trace.conversation_id, trace.depth, "rate limit");
            return Err(IngestionError::Throttled {
                conversation_id: trace.conversation_id.clone(),
            }
            .into());
        }
        window.count += 1;
        Ok(())
    }

    /// Drop windows that have expired.
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.start) < WINDOW);
    }
}

/// Prompt and response a trace is stored as.
pub fn trace_text(trace: &ReasoningTrace) -> (String, String) {
    let mut response = String::new();
    for (i, step) in trace.steps.iter().filter(|s| !s.trim().is_empty()).enumerate() {
        response.push_str(&format!("{}. {}\n", i + 1, step.trim()));
    }
    if !trace.conclusion.trim().is_empty() {
        response.push_str("Conclusion: ");
        response.push_str(trace.conclusion.trim());
    }
    (trace.question.trim().to_string(), response.trim_end().to_string())
}
