use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};

/// Baseline model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows (the most recent ones) held out for evaluation.
    pub test_size: f64,
    pub n_trees: usize,
    /// Unlimited when unset.
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub seed: u64,
    pub save_models: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
            save_models: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.n_trees == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_trees must be > 0".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_samples_split must be >= 2, got {}",
                self.min_samples_split
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_size_bounds() {
        assert!(TrainingConfig::default().validate().is_ok());
        for bad in [0.0, 1.0, -0.5, f64::NAN] {
            let config = TrainingConfig {
                test_size: bad,
                ..TrainingConfig::default()
            };
            assert!(config.validate().is_err(), "{} should be rejected", bad);
        }
    }
}
