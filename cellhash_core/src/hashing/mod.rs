//! Hash targets and the Hamming metric.
//!
//! - [`centers`] - Hadamard-based class centers with a sampled fallback
//! - [`weights`] - class-balanced loss weights
//! - [`distance`] - Hamming distance, nearest row and ranking

pub mod centers;
pub mod distance;
pub mod weights;

pub use centers::{
    generate_hash_centers, generate_hash_centers_with_rng, hadamard, HashCenterTable,
    FALLBACK_ATTEMPTS,
};
pub use distance::{
    disagreements, hamming_distance, hamming_distances, nearest_row, rank_by_distance,
};
pub use weights::{class_balance_weights, class_counts, DEFAULT_BETA};
