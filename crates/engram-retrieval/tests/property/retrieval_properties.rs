use std::sync::Arc;

use engram_clustering::ClusterView;
use engram_core::config::{ClusteringConfig, RetrievalConfig};
use engram_core::models::{InteractionNode, Lane};
use engram_retrieval::{
    fuse, Bm25Params, CorpusSnapshot, InteractionRetriever, KeywordIndex, KeywordQuery,
    LaneRanking, RrfParams,
};
use proptest::prelude::*;
use test_fixtures::{blend, make_node, tenant_scope, TEST_DIMS};

const WORDS: &[&str] = &[
    "deploy", "rollback", "postgres", "timeout", "invoice", "password", "reset", "cache",
    "latency", "refund",
];

fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 1..12).prop_map(|w| w.join(" "))
}

fn arb_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(0..40u32, 0..max).prop_map(|v| v.into_iter().map(|i| format!("d{i}")).collect())
}

fn corpus(texts: &[String], tenants: &[bool]) -> Vec<InteractionNode> {
    texts
        .iter()
        .zip(tenants)
        .enumerate()
        .map(|(i, (text, &left))| {
            let tenant = if left { "left" } else { "right" };
            make_node(
                &format!("n{i:03}"),
                text,
                "",
                tenant_scope(tenant),
                blend(TEST_DIMS, &[(i % 7, 1.0), (10 + i % 5, 0.5)]),
            )
        })
        .collect()
}

// ── Fusion depends only on the (lane, id, rank) facts ────────────────────

proptest! {
    #[test]
    fn fusion_ignores_lane_order(semantic in arb_ids(20), keyword in arb_ids(20)) {
        let s = LaneRanking::new(Lane::Semantic, semantic);
        let k = LaneRanking::new(Lane::Keyword, keyword);
        let a = fuse(&[s.clone(), k.clone()], RrfParams::default());
        let b = fuse(&[k, s], RrfParams::default());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn fused_scores_are_sorted_and_bounded(semantic in arb_ids(20), keyword in arb_ids(20)) {
        let params = RrfParams::default();
        let fused = fuse(
            &[LaneRanking::new(Lane::Semantic, semantic), LaneRanking::new(Lane::Keyword, keyword)],
            params,
        );
        let ceiling = (1.0 + params.keyword_boost) / (params.k as f64 + 1.0);
        for pair in fused.windows(2) {
            prop_assert!(pair[0].rrf_score >= pair[1].rrf_score);
        }
        for candidate in &fused {
            prop_assert!(candidate.rrf_score > 0.0 && candidate.rrf_score <= ceiling + 1e-12);
        }
    }
}

// ── Keyword scores are normalized and scope-filtered ─────────────────────

proptest! {
    #[test]
    fn keyword_scores_are_unit_interval(
        texts in prop::collection::vec(arb_text(), 1..30),
        query in arb_text(),
    ) {
        let index = KeywordIndex::build(
            texts.iter().enumerate().map(|(i, t)| (WORDS[i % WORDS.len()], t.as_str())),
        );
        let hits = index.search(&KeywordQuery::parse(&query), Bm25Params::default(), |_| true, 50);
        for hit in &hits {
            prop_assert!(hit.score > 0.0 && hit.score <= 1.0);
        }
        if let Some(first) = hits.first() {
            prop_assert!((first.score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn lanes_never_leave_the_callers_scope(
        texts in prop::collection::vec(arb_text(), 2..40),
        tenants in prop::collection::vec(any::<bool>(), 40),
        query in arb_text(),
        axis in 0usize..7,
    ) {
        let nodes = corpus(&texts, &tenants);
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let keywords = KeywordIndex::build(nodes.iter().map(|n| (n.id.as_str(), n.prompt.as_str())));
        let snapshot = CorpusSnapshot::new(
            1,
            Arc::new(nodes),
            Arc::new(Vec::new()),
            Arc::new(keywords),
            None,
            ClusterView::empty(&ClusteringConfig::default()),
        );
        let scope = tenant_scope("left");
        let visible = snapshot.visible_nodes(&scope);

        let keyword_hits = snapshot.keywords().search(
            &KeywordQuery::parse(&query),
            Bm25Params::default(),
            |id| snapshot.position(id).is_some_and(|p| visible.contains(&p)),
            50,
        );
        for hit in &keyword_hits {
            let node = snapshot.node(&hit.id).unwrap();
            prop_assert_eq!(node.scope.tenant_id(), Some("left"));
        }

        let config = RetrievalConfig::default();
        let retriever = InteractionRetriever::new(snapshot.nodes(), &config);
        let query_vector = blend(TEST_DIMS, &[(axis, 1.0)]);
        for hit in retriever.retrieve(&query_vector, 50, Some(&scope), Some(0.0)) {
            prop_assert_eq!(hit.node.scope.tenant_id(), Some("left"));
            prop_assert!(ids.contains(&hit.node.id));
        }
    }
}
