//! Error types for hashing, encoding and evaluation
//!
//! Dimension, shape and configuration problems are caller contract
//! violations: they are returned immediately and never retried.

use std::fmt;

/// Result type alias for core operations
pub type HashResult<T> = Result<T, HashError>;

/// Error type shared by every core operation
#[derive(Debug, Clone, PartialEq)]
pub enum HashError {
    /// Requested code length cannot form a Hadamard matrix
    InvalidDimension { bit: usize, reason: String },

    /// A class has no training samples, so its balance weight is undefined
    InvalidClassCount { class: usize, count: usize },

    /// Code width, feature width or label range disagrees with the model
    ShapeMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    /// Encoder profile outside the supported 3/4/5-stage shapes
    UnsupportedTopology { n_layers: usize },

    /// Invalid configuration parameter
    InvalidConfiguration {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Empty split, batch list or code buffer where data is required
    EmptyCollection { collection: String },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::InvalidDimension { bit, reason } => {
                write!(f, "Invalid code length {}: {}", bit, reason)
            }
            HashError::InvalidClassCount { class, count } => {
                write!(
                    f,
                    "Invalid class count: class {} has {} training samples, at least 1 is required",
                    class, count
                )
            }
            HashError::ShapeMismatch {
                expected,
                got,
                context,
            } => {
                write!(
                    f,
                    "Shape mismatch in {}: expected {}, got {}",
                    context, expected, got
                )
            }
            HashError::UnsupportedTopology { n_layers } => {
                write!(
                    f,
                    "Unsupported encoder topology: n_layers = {} (supported: 3, 4, 5)",
                    n_layers
                )
            }
            HashError::InvalidConfiguration {
                parameter,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid configuration for parameter '{}' with value '{}': {}",
                    parameter, value, reason
                )
            }
            HashError::EmptyCollection { collection } => {
                write!(f, "Empty collection: {}", collection)
            }
        }
    }
}

impl std::error::Error for HashError {}

impl HashError {
    pub fn invalid_dimension(bit: usize, reason: impl Into<String>) -> Self {
        HashError::InvalidDimension {
            bit,
            reason: reason.into(),
        }
    }

    pub fn invalid_class_count(class: usize, count: usize) -> Self {
        HashError::InvalidClassCount { class, count }
    }

    pub fn shape_mismatch(expected: usize, got: usize, context: impl Into<String>) -> Self {
        HashError::ShapeMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    pub fn unsupported_topology(n_layers: usize) -> Self {
        HashError::UnsupportedTopology { n_layers }
    }

    pub fn invalid_config(
        parameter: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        HashError::InvalidConfiguration {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn empty_collection(collection: impl Into<String>) -> Self {
        HashError::EmptyCollection {
            collection: collection.into(),
        }
    }
}
