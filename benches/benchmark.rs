use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use seven_tick::{
    CompiledShape, EngineConfig, JoinPattern, KnowledgeEngine, TriplePattern,
};

const RDF_TYPE: u32 = 1;

// subjects 1..size each get a few edges, ids stay clear of the wildcard
fn populated(size: u32) -> KnowledgeEngine {
    let config = EngineConfig::new(size + 1, 16, size + 1).with_shapes(8);
    let mut engine = KnowledgeEngine::new(config).unwrap();
    for s in 1..=size {
        engine.add_triple(s, 2, (s * 7) % size + 1).unwrap();
        engine.add_triple(s, 3, (s * 13) % size + 1).unwrap();
        if s % 4 == 0 {
            engine.add_triple(s, 4, 1).unwrap();
        }
    }
    engine
}

// single concrete triple tests against the bit-slabs
fn bench_ask(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ask");
    group.sample_size(100);

    let sizes: Vec<u32> = (2..5).map(|v| 10u32.pow(v)).collect();
    for size in sizes.iter() {
        group.bench_with_input(BenchmarkId::new("Hit", size), size, |b, &size| {
            let engine = populated(size);
            let s = size / 2;
            let o = (s * 7) % size + 1;
            b.iter(|| assert!(engine.ask(black_box(s), black_box(2), black_box(o))));
        });
        group.bench_with_input(BenchmarkId::new("Miss", size), size, |b, &size| {
            let engine = populated(size);
            let s = size / 2;
            b.iter(|| engine.ask(black_box(s), black_box(5), black_box(1)));
        });
    }
}

// scalar against grouped evaluation for the same pattern list
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Batch");

    let size = 10_000;
    let engine = populated(size);
    let patterns: Vec<TriplePattern> = (1..=size)
        .map(|s| TriplePattern::new(s, 2 + s % 2, (s * 7) % size + 1))
        .collect();
    let mut results = vec![false; patterns.len()];
    group.throughput(criterion::Throughput::Elements(patterns.len() as u64));

    group.bench_function("Scalar", |b| {
        b.iter(|| {
            for (r, p) in results.iter_mut().zip(black_box(&patterns)) {
                *r = engine.ask_pattern(*p);
            }
        });
    });
    group.bench_function("Grouped", |b| {
        let batch = engine.batch();
        b.iter(|| batch.ask_batch(black_box(&patterns), &mut results).unwrap());
    });
    group.bench_function("Parallel", |b| {
        let batch = engine.batch();
        b.iter(|| batch.ask_batch_parallel(black_box(&patterns), &mut results).unwrap());
    });
}

// the planner starts from the rarest pattern
fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("Join");
    group.sample_size(100);

    let sizes: Vec<u32> = (2..5).map(|v| 10u32.pow(v)).collect();
    for size in sizes.iter() {
        group.throughput(criterion::Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("Intersection", size), size, |b, &size| {
            let engine = populated(size);
            let patterns = [
                JoinPattern::subjects_with(2),
                JoinPattern::subjects_with(3),
                JoinPattern::subjects_of(4, 1),
            ];
            b.iter(|| {
                let res = engine.join_patterns(black_box(&patterns), usize::MAX).unwrap();
                assert_eq!(res.len(), (size / 4) as usize);
            });
        });
    }
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Validate");

    let size = 4096;
    let mut engine = populated(size);
    let shape = CompiledShape::builder()
        .target_class(9)
        .require_property(2)
        .forbid_property(5)
        .build()
        .unwrap();
    engine.add_shape(1, shape).unwrap();
    for s in 1..=size {
        engine.add_triple(s, RDF_TYPE, 9).unwrap();
    }

    group.bench_function("Node", |b| {
        b.iter(|| assert!(engine.validate_node(black_box(size / 3), black_box(1))));
    });

    let nodes: Vec<u32> = (1..=size).collect();
    let shapes = vec![1; nodes.len()];
    let mut results = vec![false; nodes.len()];
    group.throughput(criterion::Throughput::Elements(nodes.len() as u64));
    group.bench_function("Batch", |b| {
        b.iter(|| {
            engine
                .validate_batch(black_box(&nodes), &shapes, &mut results)
                .unwrap()
        });
    });
}

// closure cost over a deep subclass chain
fn bench_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("Closure");
    group.sample_size(20);

    let sizes: Vec<u32> = (1..4).map(|v| 10u32.pow(v)).collect();
    for size in sizes.iter() {
        group.bench_with_input(BenchmarkId::new("Subclass Chain", size), size, |b, &size| {
            let mut engine = KnowledgeEngine::new(EngineConfig::new(16, 8, size + 1)).unwrap();
            for class in 1..size {
                engine.owl_mut().add_subclass(class, class + 1).unwrap();
            }
            b.iter(|| {
                let stats = engine.compute_closures();
                black_box(stats);
            });
            assert!(engine.owl().check_subclass(1, size));
        });
    }
}

criterion_group!(
    benches,
    bench_ask,
    bench_batch,
    bench_join,
    bench_validate,
    bench_closure,
);
criterion_main!(benches);
