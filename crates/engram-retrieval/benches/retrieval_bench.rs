use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use engram_core::models::Lane;
use engram_retrieval::{fuse, Bm25Params, KeywordIndex, KeywordQuery, LaneRanking, RrfParams};

const TOPICS: [&str; 6] = [
    "postgres connection pool exhausted after deploy",
    "reset password link never arrives in the inbox",
    "quarterly revenue report export to csv",
    "kubernetes pod stuck in crashloopbackoff",
    "refund request for a duplicate invoice charge",
    "borrow checker error when mutating a vector in a loop",
];

fn corpus(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| {
            let text = format!("{} case {} {}", TOPICS[i % TOPICS.len()], i, TOPICS[(i * 7) % TOPICS.len()]);
            (format!("n{i:06}"), text)
        })
        .collect()
}

fn bench_keyword_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyword_search");
    for size in [1_000usize, 10_000] {
        let docs = corpus(size);
        let index = KeywordIndex::build(docs.iter().map(|(id, text)| (id.as_str(), text.as_str())));
        let terms = KeywordQuery::parse("postgres connection deploy");
        let phrase = KeywordQuery::parse("\"reset password\" inbox");

        group.bench_with_input(BenchmarkId::new("terms", size), &index, |b, index| {
            b.iter(|| index.search(black_box(&terms), Bm25Params::default(), |_| true, 50));
        });
        group.bench_with_input(BenchmarkId::new("phrase", size), &index, |b, index| {
            b.iter(|| index.search(black_box(&phrase), Bm25Params::default(), |_| true, 50));
        });
    }
    group.finish();
}

fn bench_rrf(c: &mut Criterion) {
    let mut group = c.benchmark_group("rrf_fuse");
    for depth in [50usize, 500] {
        let semantic = LaneRanking::new(Lane::Semantic, (0..depth).map(|i| format!("n{i}")));
        let keyword =
            LaneRanking::new(Lane::Keyword, (0..depth).rev().step_by(2).map(|i| format!("n{i}")));
        let lanes = [semantic, keyword];
        group.bench_with_input(BenchmarkId::from_parameter(depth), &lanes, |b, lanes| {
            b.iter(|| fuse(black_box(lanes), RrfParams::default()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_keyword_search, bench_rrf);
criterion_main!(benches);
