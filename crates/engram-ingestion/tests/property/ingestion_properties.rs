//! Property tests for engram-ingestion: dedup idempotence, enrichment
//! totality, and the stored shape of reasoning traces.

use std::collections::HashSet;

use engram_core::models::ReasoningTrace;
use engram_ingestion::{trace_text, DedupGate, Enricher};
use proptest::prelude::*;

fn arb_batch() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((0..20u32, 0..10u32), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(id, fp)| (format!("n{id}"), format!("fp{fp}")))
            .collect()
    })
}

proptest! {
    #[test]
    fn replaying_a_batch_adds_nothing(batch in arb_batch()) {
        let items: Vec<(&str, &str)> = batch.iter().map(|(i, f)| (i.as_str(), f.as_str())).collect();
        let mut gate = DedupGate::new();
        let first = gate.check_and_record_batch(&items);
        let committed = gate.committed_len();

        let replay = gate.check_and_record_batch(&items);
        prop_assert!(replay.iter().all(|r| r.is_err()));
        prop_assert_eq!(gate.committed_len(), committed);

        // At most one record per distinct fingerprint survives.
        let accepted = first.iter().filter(|r| r.is_ok()).count();
        let distinct: HashSet<&str> = items.iter().map(|&(_, f)| f).collect();
        prop_assert!(accepted <= distinct.len());
    }

    #[test]
    fn reservations_never_admit_twice(batch in arb_batch()) {
        let mut gate = DedupGate::new();
        let mut held = HashSet::new();
        for (id, fp) in &batch {
            if gate.try_reserve(id, fp).is_ok() {
                prop_assert!(held.insert(fp.clone()));
            }
        }
        prop_assert_eq!(gate.reserved_len(), held.len());
    }

    #[test]
    fn enrichment_is_total_and_deterministic(prompt in ".{0,200}", response in ".{0,200}") {
        let enricher = Enricher::new();
        let a = enricher.enrich(&prompt, &response);
        let b = enricher.enrich(&prompt, &response);
        prop_assert!((0.0..=1.0).contains(&a.signals.technical_depth));
        prop_assert!(a.tags.topics.len() <= 5);
        prop_assert!(a.tags.entities.len() <= 16);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn trace_text_numbers_every_non_blank_step(
        steps in prop::collection::vec("[a-z ]{0,12}", 0..8),
        conclusion in "[a-z ]{0,12}",
    ) {
        let trace = ReasoningTrace {
            conversation_id: "c".into(),
            source_node_id: None,
            question: "why".into(),
            steps: steps.clone(),
            conclusion: conclusion.clone(),
            depth: 1,
        };
        let (_, response) = trace_text(&trace);
        let numbered = response.lines().filter(|l| !l.starts_with("Conclusion: ")).count();
        let expected = steps.iter().filter(|s| !s.trim().is_empty()).count();
        prop_assert_eq!(numbered, expected);
        prop_assert_eq!(response.contains("Conclusion: "), !conclusion.trim().is_empty());
    }
}
