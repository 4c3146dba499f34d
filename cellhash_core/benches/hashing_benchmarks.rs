//! Throughput of nearest-center annotation against exhaustive retrieval
//!
//! Run with: cargo bench --bench hashing_benchmarks

use cellhash_core::hashing::{generate_hash_centers, rank_by_distance};
use cellhash_core::metrics::{mean_average_precision, one_hot};
use cellhash_core::{classify_all, encode_dataset, Batch, Execution, HashEncoder, Topology};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_codes(rows: usize, bit: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, bit), |_| rng.gen_range(-1.0f32..1.0))
}

/// Center lookup is O(n_class) per query, ranking is O(n_database)
fn bench_classify_vs_rank(c: &mut Criterion) {
    let bit = 64;
    let centers = generate_hash_centers(20, bit).unwrap();
    let queries = random_codes(1000, bit, 1);

    let mut group = c.benchmark_group("annotation");
    group.bench_function("classify_all_1000", |b| {
        b.iter(|| black_box(classify_all(queries.view(), &centers).unwrap()));
    });

    for size in [1000usize, 5000, 20000] {
        let database = random_codes(size, bit, 2);
        group.bench_with_input(BenchmarkId::new("rank_one_query", size), &size, |b, _| {
            b.iter(|| black_box(rank_by_distance(queries.row(0), database.view())));
        });
    }
    group.finish();
}

fn bench_map(c: &mut Criterion) {
    let bit = 64;
    let database = random_codes(5000, bit, 3);
    let queries = random_codes(100, bit, 4);
    let db_labels: Vec<usize> = (0..5000).map(|i| i % 10).collect();
    let query_labels: Vec<usize> = (0..100).map(|i| i % 10).collect();
    let db_one_hot = one_hot(&db_labels, 10).unwrap();
    let query_one_hot = one_hot(&query_labels, 10).unwrap();

    let mut group = c.benchmark_group("map");
    for top_k in [100usize, 1000] {
        group.bench_with_input(BenchmarkId::new("top_k", top_k), &top_k, |b, &k| {
            b.iter(|| {
                black_box(
                    mean_average_precision(
                        database.view(),
                        queries.view(),
                        db_one_hot.view(),
                        query_one_hot.view(),
                        Some(k),
                    )
                    .unwrap(),
                )
            });
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let n_features = 500;
    let encoder = HashEncoder::new(n_features, 64, Topology::from_layers(5).unwrap(), 0.05, 7)
        .unwrap();
    let features = random_codes(512, n_features, 5);
    let batches: Vec<Batch> = features
        .axis_chunks_iter(ndarray::Axis(0), 128)
        .map(|chunk| Batch::new(chunk.to_owned(), vec![0; chunk.nrows()]).unwrap())
        .collect();

    let mut group = c.benchmark_group("encode_dataset");
    group.sample_size(20);
    for (name, execution) in [
        ("sequential", Execution::Sequential),
        ("parallel", Execution::Parallel),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(encode_dataset(&batches, &encoder, execution).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify_vs_rank, bench_map, bench_encode);
criterion_main!(benches);
