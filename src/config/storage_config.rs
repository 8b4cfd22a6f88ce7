//! On-disk locations of raw data, feature tables and persisted models.

use crate::domain::market::symbol::file_stem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            models_dir: PathBuf::from("data/models"),
        }
    }
}

impl StorageConfig {
    /// Same layout rooted somewhere else, used by tests and `--data-dir`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            raw_dir: root.join("raw"),
            processed_dir: root.join("processed"),
            models_dir: root.join("models"),
        }
    }

    /// `raw_dir/BTC-USDT.csv`
    pub fn raw_path(&self, symbol: &str) -> PathBuf {
        self.raw_dir.join(format!("{}.csv", file_stem(symbol)))
    }

    /// `processed_dir/BTC-USDT_features.csv`
    pub fn features_path(&self, symbol: &str) -> PathBuf {
        self.processed_dir
            .join(format!("{}_features.csv", file_stem(symbol)))
    }

    /// `models_dir/BTC-USDT_random_forest.json`
    pub fn model_path(&self, symbol: &str, model: &str) -> PathBuf {
        self.models_dir
            .join(format!("{}_{}.json", file_stem(symbol), model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_use_file_stem() {
        let storage = StorageConfig::default();
        assert_eq!(
            storage.raw_path("BTC/USDT"),
            PathBuf::from("data/raw/BTC-USDT.csv")
        );
        assert_eq!(
            storage.features_path("ETH/USDT"),
            PathBuf::from("data/processed/ETH-USDT_features.csv")
        );
        assert_eq!(
            storage.model_path("SOL/USDT", "linear_regression"),
            PathBuf::from("data/models/SOL-USDT_linear_regression.json")
        );
    }

    #[test]
    fn test_under_root() {
        let storage = StorageConfig::under("/tmp/run");
        assert_eq!(storage.processed_dir, PathBuf::from("/tmp/run/processed"));
    }
}
