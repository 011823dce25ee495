use serde::{Deserialize, Serialize};

use super::defaults;

/// Fast filter configuration. Each check can be tuned independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    /// Maximum allowed |depth(query) - depth(candidate)|.
    pub depth_delta_bound: f64,
    /// Maximum distance between complexity tiers.
    pub complexity_span: u8,
    /// Require at least one shared domain when the query has domains.
    pub require_domain_match: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::DEFAULT_FILTER_ENABLED,
            depth_delta_bound: defaults::DEFAULT_DEPTH_DELTA_BOUND,
            complexity_span: defaults::DEFAULT_COMPLEXITY_SPAN,
            require_domain_match: defaults::DEFAULT_REQUIRE_DOMAIN_MATCH,
        }
    }
}
