//! Definition parsing and validation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use statekeeper_core::StateMachine;

fn chain_definition(states: usize) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for i in 0..states {
        let mut transitions = serde_json::Map::new();
        if i + 1 < states {
            transitions.insert(
                format!("next_{}", i),
                serde_json::json!({ "nextState": format!("state_{}", i + 1) }),
            );
        }
        map.insert(
            format!("state_{}", i),
            serde_json::json!({ "transitions": transitions }),
        );
    }
    serde_json::json!({
        "identifier": "chain",
        "initialState": "state_0",
        "states": map
    })
}

fn bench_from_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("definition_from_json");

    for size in [2usize, 20, 200] {
        let definition = chain_definition(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &definition, |b, def| {
            b.iter(|| black_box(StateMachine::from_json(def).unwrap()))
        });
    }

    group.finish();
}

fn bench_builder(c: &mut Criterion) {
    c.bench_function("definition_builder", |b| {
        b.iter(|| {
            black_box(
                StateMachine::builder("order")
                    .initial_state("NEW")
                    .state("NEW")
                    .transition("pay", "PAID")
                    .state("PAID")
                    .transition("ship", "SHIPPED")
                    .state("SHIPPED")
                    .build()
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_from_json, bench_builder);
criterion_main!(benches);
