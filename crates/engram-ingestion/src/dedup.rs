//! Dedup gate: node ids and scope-qualified content fingerprints.
//!
//! Identity is checked first, then content. Items between acceptance and
//! flush hold a reservation, so a second copy arriving while the first is
//! buffered or waiting for a retry is still a duplicate. A reservation
//! becomes a committed fingerprint only once its node is in the corpus,
//! and is released if the item is rejected.
//!
//! The gate is owned by the ingestion worker; `&mut self` on every
//! mutation is what makes check-then-reserve atomic.

use std::collections::{HashMap, HashSet};

use engram_core::fingerprint::scoped_fingerprint;
use engram_core::models::{Fingerprint, InteractionNode};

/// Why an item was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    /// The id is already in the corpus or reserved.
    KnownId { id: String },
    /// Same content under the same scope, recorded by `existing_id`.
    KnownContent { existing_id: String },
}

impl DedupVerdict {
    pub fn existing_id(&self) -> &str {
        match self {
            Self::KnownId { id } => id,
            Self::KnownContent { existing_id } => existing_id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupGate {
    /// Committed ids.
    ids: HashSet<String>,
    /// Committed fingerprint → node id.
    fingerprints: HashMap<String, String>,
    /// Reserved id → fingerprint.
    reserved: HashMap<String, String>,
    /// Reserved fingerprint → id.
    reserved_fingerprints: HashMap<String, String>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the committed set from corpus nodes.
    pub fn rebuild_from(nodes: &[InteractionNode]) -> Self {
        let mut gate = Self::new();
        for node in nodes {
            gate.record(&node.id, &scoped_fingerprint(&node.scope, &node.content_hash));
        }
        gate
    }

    /// Restore from persisted fingerprints. Ids of the corpus must be
    /// passed too: a fingerprint only names the first node with that
    /// content.
    pub fn restore<'a>(ids: impl IntoIterator<Item = &'a str>, fingerprints: &[Fingerprint]) -> Self {
        let mut gate = Self::new();
        gate.ids.extend(ids.into_iter().map(str::to_string));
        for fp in fingerprints {
            gate.fingerprints
                .entry(fp.hash.clone())
                .or_insert_with(|| fp.node_id.clone());
        }
        gate
    }

    pub fn check(&self, id: &str, fingerprint: &str) -> Result<(), DedupVerdict> {
        if self.ids.contains(id) || self.reserved.contains_key(id) {
            return Err(DedupVerdict::KnownId { id: id.to_string() });
        }
        let existing = self
            .fingerprints
            .get(fingerprint)
            .or_else(|| self.reserved_fingerprints.get(fingerprint));
        match existing {
            Some(existing_id) => Err(DedupVerdict::KnownContent {
                existing_id: existing_id.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn is_duplicate(&self, id: &str, fingerprint: &str) -> bool {
        self.check(id, fingerprint).is_err()
    }

    /// Record a committed node directly.
    pub fn record(&mut self, id: &str, fingerprint: &str) {
        self.ids.insert(id.to_string());
        self.fingerprints
            .entry(fingerprint.to_string())
            .or_insert_with(|| id.to_string());
    }

    /// Check and, when fresh, hold the id and fingerprint until
    /// [`DedupGate::commit`] or [`DedupGate::release`].
    pub fn try_reserve(&mut self, id: &str, fingerprint: &str) -> Result<(), DedupVerdict> {
        self.check(id, fingerprint)?;
        self.reserved.insert(id.to_string(), fingerprint.to_string());
        self.reserved_fingerprints
            .insert(fingerprint.to_string(), id.to_string());
        Ok(())
    }

    /// Fingerprint a reservation will commit, if `id` is reserved.
    pub fn reserved_fingerprint(&self, id: &str) -> Option<Fingerprint> {
        self.reserved.get(id).map(|hash| Fingerprint {
            hash: hash.clone(),
            node_id: id.to_string(),
        })
    }

    /// Turn a reservation into a committed record.
    pub fn commit(&mut self, id: &str) -> Option<Fingerprint> {
        let hash = self.reserved.remove(id)?;
        self.reserved_fingerprints.remove(&hash);
        self.record(id, &hash);
        Some(Fingerprint {
            hash,
            node_id: id.to_string(),
        })
    }

    /// Drop a reservation, so the same content can be submitted again.
    pub fn release(&mut self, id: &str) {
        if let Some(hash) = self.reserved.remove(id) {
            self.reserved_fingerprints.remove(&hash);
        }
    }

    /// Check and record a batch in order; later copies of an earlier item
    /// in the same batch are duplicates.
    pub fn check_and_record_batch(&mut self, items: &[(&str, &str)]) -> Vec<Result<(), DedupVerdict>> {
        items
            .iter()
            .map(|&(id, fingerprint)| {
                self.check(id, fingerprint)?;
                self.record(id, fingerprint);
                Ok(())
            })
            .collect()
    }

    /// Committed fingerprints, sorted by hash.
    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        let mut out: Vec<Fingerprint> = self
            .fingerprints
            .iter()
            .map(|(hash, node_id)| Fingerprint {
                hash: hash.clone(),
                node_id: node_id.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.hash.cmp(&b.hash));
        out
    }

    /// Committed fingerprints whose node is not in `ids`.
    pub fn dangling<'a>(&'a self, ids: &'a HashSet<&str>) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.fingerprints
            .iter()
            .filter(|(_, node_id)| !ids.contains(node_id.as_str()))
            .map(|(hash, node_id)| (hash.as_str(), node_id.as_str()))
    }

    pub fn committed_len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn reserved_len(&self) -> usize {
        self.reserved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::fingerprint::content_fingerprint;
    use test_fixtures::{make_node, tenant_scope, unit_vector, TEST_DIMS};

    fn fp(tenant: &str, text: &str) -> String {
        scoped_fingerprint(&tenant_scope(tenant), &content_fingerprint(text, ""))
    }

    #[test]
    fn identity_then_content() {
        let mut gate = DedupGate::new();
        gate.record("a", &fp("acme", "reset my password"));
        assert_eq!(
            gate.check("a", &fp("acme", "something else")),
            Err(DedupVerdict::KnownId { id: "a".into() })
        );
        assert_eq!(
            gate.check("b", &fp("acme", "Reset  my PASSWORD")),
            Err(DedupVerdict::KnownContent { existing_id: "a".into() })
        );
        assert!(!gate.is_duplicate("b", &fp("globex", "reset my password")));
    }

    #[test]
    fn reservations_block_until_released() {
        let mut gate = DedupGate::new();
        let f = fp("acme", "x");
        gate.try_reserve("a", &f).unwrap();
        assert!(gate.try_reserve("b", &f).is_err());
        assert_eq!(gate.reserved_len(), 1);
        gate.release("a");
        assert!(gate.try_reserve("b", &f).is_ok());
        let committed = gate.commit("b").unwrap();
        assert_eq!(committed.node_id, "b");
        assert_eq!(gate.reserved_len(), 0);
        assert_eq!(gate.committed_len(), 1);
        assert!(gate.is_duplicate("c", &f));
    }

    #[test]
    fn batch_catches_copies_within_the_batch() {
        let mut gate = DedupGate::new();
        let f1 = fp("acme", "one");
        let f2 = fp("acme", "two");
        let results = gate.check_and_record_batch(&[("a", &f1), ("b", &f2), ("c", &f1)]);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert_eq!(
            results[2],
            Err(DedupVerdict::KnownContent { existing_id: "a".into() })
        );
    }

    #[test]
    fn rebuild_matches_the_corpus() {
        let nodes = vec![
            make_node("n1", "p", "r", tenant_scope("acme"), unit_vector(TEST_DIMS, 0)),
            make_node("n2", "p", "r", tenant_scope("globex"), unit_vector(TEST_DIMS, 0)),
            make_node("n3", "p", "r", tenant_scope("acme"), unit_vector(TEST_DIMS, 0)),
        ];
        let gate = DedupGate::rebuild_from(&nodes);
        assert_eq!(gate.committed_len(), 2);
        let ids: HashSet<&str> = ["n1", "n2"].into_iter().collect();
        let dangling: Vec<_> = gate.dangling(&ids).collect();
        assert!(dangling.is_empty());
        let only_n2: HashSet<&str> = ["n2"].into_iter().collect();
        assert_eq!(gate.dangling(&only_n2).count(), 1);
    }
}
