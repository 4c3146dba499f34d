//! Classification, clustering and retrieval metrics.

pub mod classification;
pub mod clustering;
pub mod report;
pub mod retrieval;

pub use classification::{accuracy, classification_report, median, ClassStats, LabelCounts};
pub use clustering::adjusted_rand_index;
pub use report::{evaluate, MetricsReport, RetrievalInputs};
pub use retrieval::{mean_average_precision, one_hot, ranked_database_labels, MapScore};
