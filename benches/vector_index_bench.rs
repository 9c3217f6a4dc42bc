//! Vector index benchmarks
//!
//! Measures insertion and k-NN query latency for each on-disk precision,
//! plus the cost of persisting and reopening an index.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sercha_vector::vector::codec::{encode_f16, quantize_i8};
use sercha_vector::{Precision, VectorIndexEngine};
use std::hint::black_box;
use tempfile::TempDir;

const DIMENSION: usize = 384;
const INDEX_SIZE: usize = 2_000;

fn random_vectors(count: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| (0..DIMENSION).map(|_| rng.random_range(-1.0f32..1.0)).collect())
        .collect()
}

fn populated(dir: &TempDir, precision: Precision, vectors: &[Vec<f32>]) -> VectorIndexEngine {
    let engine = VectorIndexEngine::create(dir.path(), DIMENSION, 1024, precision).unwrap();
    for (i, vector) in vectors.iter().enumerate() {
        engine.add(&format!("chunk-{i}"), vector).unwrap();
    }
    engine
}

fn bench_add(c: &mut Criterion) {
    let vectors = random_vectors(500);
    let mut group = c.benchmark_group("vector_add");
    group.throughput(Throughput::Elements(vectors.len() as u64));
    group.sample_size(10);

    group.bench_function("add_500", |b| {
        b.iter(|| {
            let dir = TempDir::new().unwrap();
            black_box(populated(&dir, Precision::Float32, &vectors));
        })
    });
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let vectors = random_vectors(INDEX_SIZE);
    let queries = random_vectors(64);
    let dir = TempDir::new().unwrap();
    let engine = populated(&dir, Precision::Float32, &vectors);

    let mut group = c.benchmark_group("vector_search");
    for k in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            let mut next = 0;
            b.iter(|| {
                let query = &queries[next % queries.len()];
                next += 1;
                black_box(engine.search(query, k).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_persist_and_reopen(c: &mut Criterion) {
    let vectors = random_vectors(INDEX_SIZE);
    let mut group = c.benchmark_group("vector_reopen");
    group.sample_size(10);

    for precision in Precision::ALL {
        let dir = TempDir::new().unwrap();
        let engine = populated(&dir, precision, &vectors);
        engine.close().unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(precision),
            &precision,
            |b, _| b.iter(|| black_box(VectorIndexEngine::open(dir.path(), DIMENSION).unwrap())),
        );
    }
    group.finish();
}

fn bench_codecs(c: &mut Criterion) {
    let vector = random_vectors(1).remove(0);
    let mut group = c.benchmark_group("vector_codec");
    group.throughput(Throughput::Elements(DIMENSION as u64));

    group.bench_function("encode_f16", |b| b.iter(|| black_box(encode_f16(&vector))));
    group.bench_function("quantize_i8", |b| b.iter(|| black_box(quantize_i8(&vector))));
    group.finish();
}

criterion_group!(
    benches,
    bench_add,
    bench_search,
    bench_persist_and_reopen,
    bench_codecs
);
criterion_main!(benches);
