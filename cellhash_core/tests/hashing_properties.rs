use cellhash_core::hashing::{
    class_balance_weights, generate_hash_centers, generate_hash_centers_with_rng,
    hamming_distance, FALLBACK_ATTEMPTS,
};
use cellhash_core::metrics::{mean_average_precision, one_hot};
use cellhash_core::{
    classify, encode_dataset, Batch, Execution, HashEncoder, HashError, Topology,
};
use ndarray::{arr1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn centers_are_distinct_binary_rows_whenever_capacity_allows() {
    for bit in [4usize, 8, 16, 32] {
        for n_class in 1..=2 * bit {
            let centers = generate_hash_centers(n_class, bit).unwrap();
            let rows = centers.as_array();
            assert_eq!(rows.dim(), (n_class, bit));
            assert!(rows.iter().all(|&v| v == 1.0 || v == -1.0));
            for i in 0..n_class {
                for j in (i + 1)..n_class {
                    assert_ne!(rows.row(i), rows.row(j), "bit={bit} rows {i} and {j}");
                }
            }
        }
    }
}

#[test]
fn five_classes_in_eight_bits() {
    let centers = generate_hash_centers(5, 8).unwrap();
    let (min, mean) = centers.separation().unwrap();
    assert!(min > 8 / 4);
    assert!(mean >= 4.0);
}

#[test]
fn center_generation_is_deterministic_within_capacity() {
    let a = generate_hash_centers(12, 16).unwrap();
    let b = generate_hash_centers(12, 16).unwrap();
    assert_eq!(a, b);
}

#[test]
fn fallback_pads_with_balanced_rows() {
    let mut rng = StdRng::seed_from_u64(11);
    let centers = generate_hash_centers_with_rng(20, 8, &mut rng).unwrap();
    let rows = centers.as_array();
    assert_eq!(rows.nrows(), 20);
    for row in rows.rows().into_iter().skip(16) {
        assert_eq!(row.iter().filter(|&&v| v < 0.0).count(), 4);
    }
    assert_eq!(FALLBACK_ATTEMPTS, 20);
}

#[test]
fn invalid_code_length_is_rejected() {
    assert!(matches!(
        generate_hash_centers(3, 12),
        Err(HashError::InvalidDimension { bit: 12, .. })
    ));
}

#[test]
fn class_balance_weight_scenarios() {
    let weights = class_balance_weights(&[15, 10, 10, 10, 19], 5, 0.9999).unwrap();
    let expected = [0.7951, 1.1924, 1.1924, 1.1924, 0.6278];
    for (w, e) in weights.iter().zip(expected) {
        assert!((w - e).abs() < 1e-3, "{w} vs {e}");
    }
    assert!((weights.sum() - 5.0).abs() < 1e-4);

    for beta in [0.0, 0.5, 0.9999] {
        let uniform = class_balance_weights(&[1, 1, 1, 1, 1], 5, beta).unwrap();
        assert!(uniform.iter().all(|w| (w - 1.0).abs() < 1e-6));
    }
}

#[test]
fn rarer_classes_weigh_more() {
    let weights = class_balance_weights(&[5, 10, 20, 40], 4, 0.999).unwrap();
    assert!(weights.windows(2).into_iter().all(|w| w[0] > w[1]));
    assert!((weights.sum() - 4.0).abs() < 1e-4);
}

#[test]
fn hamming_distance_counts_differing_positions() {
    let a = arr1(&[1.0, -1.0, 1.0, -1.0]);
    let b = arr1(&[1.0, 1.0, 1.0, -1.0]);
    assert_eq!(hamming_distance(a.view(), b.view()), 2.0);
}

#[test]
fn classifying_a_center_returns_its_class() {
    let centers = generate_hash_centers(10, 16).unwrap();
    for class in 0..10 {
        let code = centers.center(class).unwrap();
        assert_eq!(classify(code, &centers).unwrap(), class);
    }
}

#[test]
fn encoding_twice_is_bit_identical() {
    let encoder = HashEncoder::new(10, 16, Topology::from_layers(4).unwrap(), 0.01, 5).unwrap();
    let features = Array2::from_shape_fn((7, 10), |(i, j)| ((i * 10 + j) as f32).sin());
    let batches = vec![Batch::new(features, vec![0, 1, 2, 0, 1, 2, 0]).unwrap()];

    for execution in [Execution::Sequential, Execution::Parallel] {
        let first = encode_dataset(&batches, &encoder, execution).unwrap();
        let second = encode_dataset(&batches, &encoder, execution).unwrap();
        assert_eq!(first, second);
        assert!(first.codes.iter().all(|v| v.abs() < 1.0));
    }
}

#[test]
fn map_is_zero_when_nothing_relevant_is_retrieved() {
    let database = Array2::from_shape_vec((3, 2), vec![1.0, 1.0, 1.0, -1.0, -1.0, 1.0]).unwrap();
    let queries = Array2::from_shape_vec((2, 2), vec![1.0, 1.0, -1.0, -1.0]).unwrap();
    let db_labels = one_hot(&[0, 0, 0], 2).unwrap();
    let query_labels = one_hot(&[1, 1], 2).unwrap();

    let score = mean_average_precision(
        database.view(),
        queries.view(),
        db_labels.view(),
        query_labels.view(),
        Some(2),
    )
    .unwrap();
    assert_eq!(score.map, 0.0);
    assert_eq!(score.skipped_queries, 2);
    assert_eq!(score.total_queries, 2);
}

#[test]
fn map_is_one_when_everything_is_relevant() {
    let database = Array2::from_shape_fn((6, 4), |(i, j)| if (i + j) % 2 == 0 { 1.0 } else { -1.0 });
    let queries = Array2::from_shape_fn((3, 4), |(i, j)| if i == j { 1.0 } else { -1.0 });
    let db_labels = one_hot(&[0; 6], 1).unwrap();
    let query_labels = one_hot(&[0; 3], 1).unwrap();

    let score = mean_average_precision(
        database.view(),
        queries.view(),
        db_labels.view(),
        query_labels.view(),
        Some(10),
    )
    .unwrap();
    assert!((score.map - 1.0).abs() < 1e-12);
    assert_eq!(score.skipped_queries, 0);
}
