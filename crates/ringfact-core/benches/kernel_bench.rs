//! # Kernel Benchmarks
//!
//! Run with: `cargo bench -p ringfact-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ringfact_core::{KnowledgeGraph, Ring, derive, execute, seal, validate};
use serde_json::json;
use std::hint::black_box;

fn bench_critical_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("critical_identity");
    for n in [8u32, 12, 16, 32] {
        let ring = Ring::for_existence(n).expect("ring");
        group.bench_with_input(BenchmarkId::from_parameter(n), &ring, |b, ring| {
            b.iter(|| black_box(ring.verify_critical_identity()));
        });
    }
    group.finish();
}

fn bench_derive(c: &mut Criterion) {
    let ring = Ring::default();
    c.bench_function("derive_nested", |b| {
        b.iter(|| derive(black_box("add(mul(3,171),xor(neg(bnot(42)),succ(7)))"), ring));
    });
}

fn bench_graph(c: &mut Criterion) {
    c.bench_function("graph_build_q8", |b| {
        b.iter(|| black_box(KnowledgeGraph::build(Ring::default())));
    });

    let graph = KnowledgeGraph::build(Ring::default());
    c.bench_function("query_join", |b| {
        b.iter(|| {
            execute(
                &graph,
                black_box(
                    "SELECT ?s ?v WHERE { ?s partition:class partition:IrreducibleSet . ?s schema:value ?v FILTER(?v < 64) }",
                ),
            )
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    c.bench_function("conformance_q8", |b| {
        b.iter(|| black_box(validate(Ring::default())));
    });
}

fn bench_seal(c: &mut Criterion) {
    let payload = json!({"@type": "schema:Note", "text": "hello", "tags": ["a", "b", "c"]});
    c.bench_function("seal_envelope", |b| {
        b.iter(|| seal(black_box(&payload), 1_700_000_000));
    });
}

criterion_group!(
    benches,
    bench_critical_identity,
    bench_derive,
    bench_graph,
    bench_validate,
    bench_seal
);
criterion_main!(benches);
