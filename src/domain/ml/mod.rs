pub mod feature_registry;
pub mod feature_table;
pub mod metrics;

pub use feature_registry::{FeatureColumn, FeatureSchema};
pub use feature_table::{FeatureDataset, FeatureRow, FeatureTable};
pub use metrics::RegressionMetrics;
