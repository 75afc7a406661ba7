use std::collections::{BTreeMap, BTreeSet};

use criterion::{criterion_group, criterion_main, Criterion};
use prins::config::{DeterminizeStrategy, PipelineConfig};
use prins::ids::ExecId;
use prins::log_entry::{LogEntry, Timestamp};
use prins::pipeline::Pipeline;
use prins::{MockCompLearner, RawAutomaton};

const DIAMONDS: u32 = 25;

/// A chain of `DIAMONDS` non-deterministic diamonds: `s0 --a--> {s1,s2} --b--> s3`,
/// with `s3` feeding the next diamond's `s0`. Exercises repeated state merging.
fn diamond_chain() -> RawAutomaton {
    let mut states = BTreeSet::new();
    let mut edges = Vec::new();
    for i in 0..DIAMONDS {
        let base = i * 3;
        states.extend([base, base + 1, base + 2, base + 3]);
        edges.push((base, "a".to_string(), base + 1));
        edges.push((base, "a".to_string(), base + 2));
        edges.push((base + 1, "b".to_string(), base + 3));
        edges.push((base + 2, "b".to_string(), base + 3));
    }
    let end = DIAMONDS * 3;
    edges.push((end, "__END__".to_string(), end));
    RawAutomaton {
        states,
        initial_state: 0,
        edges,
    }
}

fn matching_trace() -> Vec<LogEntry> {
    let mut trace = Vec::with_capacity(DIAMONDS as usize * 2);
    for i in 0..DIAMONDS * 2 {
        let tid = if i % 2 == 0 { "a" } else { "b" };
        trace.push(LogEntry::new(Timestamp::new(i as u64), "c", tid, vec![]));
    }
    trace
}

fn run_pipeline(strategy: DeterminizeStrategy) {
    let learner = MockCompLearner::new().with_model("c", diamond_chain());
    let config = PipelineConfig {
        determinize_strategy: Some(strategy),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(learner, config);

    let mut corpus = BTreeMap::new();
    corpus.insert(ExecId::new(1), matching_trace());

    let (_nfa, dfa, _report) = pipeline.run(&corpus).unwrap();
    assert!(dfa.unwrap().accepts(&matching_trace()).unwrap());
}

fn determinize_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("determinize_strategies");
    group.bench_function("standard", |b| {
        b.iter(|| run_pipeline(DeterminizeStrategy::Standard));
    });
    group.bench_function("heuristic", |b| {
        b.iter(|| run_pipeline(DeterminizeStrategy::Heuristic));
    });
    group.bench_function("hybrid_k1", |b| {
        b.iter(|| run_pipeline(DeterminizeStrategy::HybridK(1)));
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = determinize_benchmark
}

criterion_main!(benches);
