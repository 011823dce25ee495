//! Fast filter: a boolean pre-gate over precomputed heuristic signals.
//!
//! The filter only shrinks the working set before the lanes run. It fails
//! open: an empty profile, a disabled filter, or a profile nothing survives
//! all leave the candidate set untouched.

use std::collections::BTreeSet;

use engram_core::config::FilterConfig;
use engram_core::models::{Complexity, Domain, InteractionNode, SignalBundle, TagSet};

/// Query-side signals the filter compares candidates against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterProfile {
    pub domains: BTreeSet<Domain>,
    pub technical_depth: Option<f64>,
    pub complexity: Option<Complexity>,
}

impl FilterProfile {
    /// A profile that filters nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_signals(signals: &SignalBundle, tags: &TagSet) -> Self {
        Self {
            domains: tags.domains.clone(),
            technical_depth: Some(signals.technical_depth),
            complexity: Some(signals.complexity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.technical_depth.is_none() && self.complexity.is_none()
    }
}

/// Surviving candidate positions and whether the filter narrowed anything.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub survivors: Vec<usize>,
    /// False when the filter passed every candidate through.
    pub applied: bool,
}

#[derive(Debug, Clone)]
pub struct FastFilter {
    config: FilterConfig,
}

impl FastFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Reduce `candidates` (positions into `nodes`) to those passing every
    /// enabled check.
    pub fn filter(
        &self,
        profile: &FilterProfile,
        candidates: &[usize],
        nodes: &[InteractionNode],
    ) -> FilterOutcome {
        let pass_through = || FilterOutcome {
            survivors: candidates.to_vec(),
            applied: false,
        };
        if !self.config.enabled || profile.is_empty() || candidates.is_empty() {
            return pass_through();
        }

        let survivors: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| nodes.get(i).is_some_and(|node| self.admits(profile, node)))
            .collect();

        if survivors.is_empty() {
            tracing::debug!(
                candidates = candidates.len(),
                "fast filter matched nothing, falling back to all candidates"
            );
            return pass_through();
        }
        FilterOutcome {
            applied: survivors.len() < candidates.len(),
            survivors,
        }
    }

    fn admits(&self, profile: &FilterProfile, node: &InteractionNode) -> bool {
        let domain_ok = !self.config.require_domain_match
            || profile.domains.is_empty()
            || !profile.domains.is_disjoint(&node.tags.domains);

        let depth_ok = profile.technical_depth.map_or(true, |depth| {
            (depth - node.signals.technical_depth).abs() <= self.config.depth_delta_bound
        });

        let complexity_ok = profile.complexity.map_or(true, |tier| {
            tier.tier().abs_diff(node.signals.complexity.tier()) <= self.config.complexity_span
        });

        domain_ok && depth_ok && complexity_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::{make_node, tenant_scope, unit_vector, TEST_DIMS};

    fn node(id: &str, domain: Option<Domain>, depth: f64, complexity: Complexity) -> InteractionNode {
        let mut n = make_node(id, "p", "r", tenant_scope("acme"), unit_vector(TEST_DIMS, 0));
        n.tags.domains.extend(domain);
        n.signals.technical_depth = depth;
        n.signals.complexity = complexity;
        n
    }

    fn corpus() -> Vec<InteractionNode> {
        vec![
            node("db", Some(Domain::Databases), 0.8, Complexity::Complex),
            node("acct", Some(Domain::Account), 0.1, Complexity::Simple),
            node("web", Some(Domain::Web), 0.5, Complexity::Moderate),
        ]
    }

    #[test]
    fn empty_profile_passes_everything() {
        let nodes = corpus();
        let out = FastFilter::new(FilterConfig::default()).filter(&FilterProfile::empty(), &[0, 1, 2], &nodes);
        assert_eq!(out.survivors, [0, 1, 2]);
        assert!(!out.applied);
    }

    #[test]
    fn boolean_and_over_checks() {
        let nodes = corpus();
        let profile = FilterProfile {
            domains: [Domain::Databases].into(),
            technical_depth: Some(0.7),
            complexity: Some(Complexity::Complex),
        };
        let out = FastFilter::new(FilterConfig::default()).filter(&profile, &[0, 1, 2], &nodes);
        assert_eq!(out.survivors, [0]);
        assert!(out.applied);
    }

    #[test]
    fn no_match_fails_open() {
        let nodes = corpus();
        let profile = FilterProfile {
            domains: [Domain::Health].into(),
            ..FilterProfile::empty()
        };
        let out = FastFilter::new(FilterConfig::default()).filter(&profile, &[0, 1, 2], &nodes);
        assert_eq!(out.survivors, [0, 1, 2]);
        assert!(!out.applied);
    }

    #[test]
    fn disabled_filter_is_a_no_op() {
        let nodes = corpus();
        let config = FilterConfig {
            enabled: false,
            ..FilterConfig::default()
        };
        let profile = FilterProfile {
            domains: [Domain::Databases].into(),
            ..FilterProfile::empty()
        };
        let out = FastFilter::new(config).filter(&profile, &[1, 2], &nodes);
        assert_eq!(out.survivors, [1, 2]);
    }

    #[test]
    fn complexity_span_bounds_tier_distance() {
        let nodes = corpus();
        let profile = FilterProfile {
            complexity: Some(Complexity::Simple),
            ..FilterProfile::empty()
        };
        let out = FastFilter::new(FilterConfig::default()).filter(&profile, &[0, 1, 2], &nodes);
        assert_eq!(out.survivors, [1, 2]);
    }
}
