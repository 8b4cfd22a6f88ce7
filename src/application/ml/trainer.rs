//! Baseline regressors trained per symbol on the chronological split.

use super::dataset::SupervisedSplit;
use crate::config::{StorageConfig, TrainingConfig};
use crate::domain::errors::PipelineError;
use crate::domain::ml::{FeatureDataset, RegressionMetrics};
use serde::Serialize;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Output of one fit: test-set predictions and the serialized model.
pub struct FitOutput {
    pub predictions: Vec<f64>,
    pub model_json: Vec<u8>,
}

/// A regressor that can be fitted on the train rows and scored on the test rows.
pub trait BaselineRegressor: Send + Sync {
    /// File-name friendly identifier, e.g. `random_forest`.
    fn name(&self) -> &'static str;

    fn label(&self) -> &'static str;

    fn fit_predict(
        &self,
        x_train: &DenseMatrix<f64>,
        y_train: &Vec<f64>,
        x_test: &DenseMatrix<f64>,
    ) -> Result<FitOutput, String>;
}

/// Ordinary least squares. Solved by SVD since several feature columns are
/// exact linear combinations of others (Bollinger bands, MACD histogram).
pub struct LinearBaseline;

impl BaselineRegressor for LinearBaseline {
    fn name(&self) -> &'static str {
        "linear_regression"
    }

    fn label(&self) -> &'static str {
        "Linear Regression"
    }

    fn fit_predict(
        &self,
        x_train: &DenseMatrix<f64>,
        y_train: &Vec<f64>,
        x_test: &DenseMatrix<f64>,
    ) -> Result<FitOutput, String> {
        let params =
            LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);
        let model: LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>> =
            LinearRegression::fit(x_train, y_train, params)
                .map_err(|e| format!("Training error: {}", e))?;
        let predictions = model
            .predict(x_test)
            .map_err(|e| format!("Prediction error: {}", e))?;
        Ok(FitOutput {
            predictions,
            model_json: to_json(&model)?,
        })
    }
}

/// Seeded random forest; the same seed and rows give the same model.
pub struct ForestBaseline {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl BaselineRegressor for ForestBaseline {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn label(&self) -> &'static str {
        "Random Forest"
    }

    fn fit_predict(
        &self,
        x_train: &DenseMatrix<f64>,
        y_train: &Vec<f64>,
        x_test: &DenseMatrix<f64>,
    ) -> Result<FitOutput, String> {
        let mut params = RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees)
            .with_min_samples_split(self.min_samples_split)
            .with_seed(self.seed);
        if let Some(depth) = self.max_depth {
            params = params.with_max_depth(depth);
        }
        let model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>> =
            RandomForestRegressor::fit(x_train, y_train, params)
                .map_err(|e| format!("Training error: {}", e))?;
        let predictions = model
            .predict(x_test)
            .map_err(|e| format!("Prediction error: {}", e))?;
        Ok(FitOutput {
            predictions,
            model_json: to_json(&model)?,
        })
    }
}

fn to_json<M: Serialize>(model: &M) -> Result<Vec<u8>, String> {
    serde_json::to_vec(model).map_err(|e| format!("Serialization error: {}", e))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelScore {
    pub model: &'static str,
    pub label: &'static str,
    pub metrics: RegressionMetrics,
    pub saved_to: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub symbol: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub scores: Vec<ModelScore>,
}

impl TrainingReport {
    pub fn score(&self, model: &str) -> Option<&ModelScore> {
        self.scores.iter().find(|s| s.model == model)
    }
}

pub struct ModelTrainer {
    config: TrainingConfig,
    storage: StorageConfig,
    models: Vec<Box<dyn BaselineRegressor>>,
}

impl ModelTrainer {
    /// Linear regression and a random forest configured from `config`.
    pub fn new(config: TrainingConfig, storage: StorageConfig) -> Self {
        let models: Vec<Box<dyn BaselineRegressor>> = vec![
            Box::new(LinearBaseline),
            Box::new(ForestBaseline {
                n_trees: config.n_trees,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.seed,
            }),
        ];
        Self {
            config,
            storage,
            models,
        }
    }

    pub fn with_models(mut self, models: Vec<Box<dyn BaselineRegressor>>) -> Self {
        self.models = models;
        self
    }

    pub fn train(&self, dataset: &FeatureDataset) -> Result<TrainingReport, PipelineError> {
        let symbol = dataset.symbol.as_str();
        let training_error = |reason: String| PipelineError::Training {
            symbol: symbol.to_string(),
            reason,
        };

        let split = SupervisedSplit::from_dataset(dataset, self.config.test_size)?;
        debug!(
            "{}: {} train rows, {} test rows, {} features",
            symbol,
            split.train_len(),
            split.test_len(),
            split.feature_names.len()
        );

        let x_train = DenseMatrix::from_2d_vec(&split.x_train)
            .map_err(|e| training_error(format!("Matrix error: {}", e)))?;
        let x_test = DenseMatrix::from_2d_vec(&split.x_test)
            .map_err(|e| training_error(format!("Matrix error: {}", e)))?;

        let mut scores = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let output = model
                .fit_predict(&x_train, &split.y_train, &x_test)
                .map_err(|reason| training_error(format!("{}: {}", model.label(), reason)))?;

            let metrics = RegressionMetrics::compute(&output.predictions, &split.y_test)
                .ok_or_else(|| {
                    training_error(format!("{}: prediction count mismatch", model.label()))
                })?;

            info!(
                "{} {}: MAE={:.4} RMSE={:.4} R2={:.4}",
                symbol,
                model.label(),
                metrics.mae,
                metrics.rmse,
                metrics.r2
            );

            let saved_to = if self.config.save_models {
                Some(self.save(symbol, model.name(), &output.model_json)?)
            } else {
                None
            };

            scores.push(ModelScore {
                model: model.name(),
                label: model.label(),
                metrics,
                saved_to,
            });
        }

        Ok(TrainingReport {
            symbol: symbol.to_string(),
            train_rows: split.train_len(),
            test_rows: split.test_len(),
            scores,
        })
    }

    fn save(&self, symbol: &str, model: &str, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
        std::fs::create_dir_all(&self.storage.models_dir)
            .map_err(|e| PipelineError::io(&self.storage.models_dir, e))?;
        let path = self.storage.model_path(symbol, model);
        std::fs::write(&path, bytes).map_err(|e| PipelineError::io(&path, e))?;
        debug!("Saved {} model to {}", model, path.display());
        Ok(path)
    }
}
