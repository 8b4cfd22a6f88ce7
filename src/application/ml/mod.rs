pub mod dataset;
pub mod trainer;

pub use dataset::SupervisedSplit;
pub use trainer::{ModelScore, ModelTrainer, TrainingReport};
