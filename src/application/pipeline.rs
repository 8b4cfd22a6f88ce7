//! Batch driver: runs each stage over every configured symbol.
//!
//! A failure is scoped to its symbol. It is logged, recorded in the
//! [`BatchReport`], and the remaining symbols carry on.

use crate::application::feature_engineering_service::FeatureEngine;
use crate::application::ml::{ModelTrainer, TrainingReport};
use crate::config::PipelineConfig;
use crate::domain::errors::{ErrorKind, PipelineError};
use crate::domain::ports::HistoricalDataService;
use crate::domain::validation::SeriesCleaner;
use crate::infrastructure::observability::StageTimer;
use crate::infrastructure::persistence::CsvStore;
use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Preprocess,
    Train,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Fetch => "fetch",
            Stage::Preprocess => "preprocess",
            Stage::Train => "train",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Fetched { bars: usize, path: PathBuf },
    Preprocessed { rows: usize, path: PathBuf },
    Trained(TrainingReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub reason: String,
}

impl From<PipelineError> for Failure {
    fn from(e: PipelineError) -> Self {
        Self {
            kind: e.kind(),
            reason: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub stage: Stage,
    pub result: Result<StageOutput, Failure>,
}

impl SymbolOutcome {
    fn new(symbol: &str, stage: Stage, result: Result<StageOutput, PipelineError>) -> Self {
        if let Err(e) = &result {
            error!("[{}] {} failed: {}", stage, symbol, e);
        }
        Self {
            symbol: symbol.to_string(),
            stage,
            result: result.map_err(Failure::from),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of one or more stages, in symbol order within each stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<SymbolOutcome>,
}

impl BatchReport {
    pub fn extend(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(move |o| o.stage == stage)
    }

    pub fn outcome(&self, symbol: &str, stage: Stage) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.symbol == symbol && o.stage == stage)
    }

    /// Symbols that succeeded in `stage`.
    pub fn succeeded(&self, stage: Stage) -> Vec<String> {
        self.stage(stage)
            .filter(|o| o.is_ok())
            .map(|o| o.symbol.clone())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// True when there was work and none of it succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.is_ok())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:<11} RESULT", "SYMBOL", "STAGE")?;
        for outcome in &self.outcomes {
            write!(f, "{:<12} {:<11} ", outcome.symbol, outcome.stage)?;
            match &outcome.result {
                Ok(StageOutput::Fetched { bars, path }) => {
                    writeln!(f, "ok: {} bars -> {}", bars, path.display())?
                }
                Ok(StageOutput::Preprocessed { rows, path }) => {
                    writeln!(f, "ok: {} rows -> {}", rows, path.display())?
                }
                Ok(StageOutput::Trained(report)) => {
                    let scores: Vec<String> = report
                        .scores
                        .iter()
                        .map(|s| {
                            format!(
                                "{} MAE={:.4} RMSE={:.4}",
                                s.label, s.metrics.mae, s.metrics.rmse
                            )
                        })
                        .collect();
                    writeln!(f, "ok: {}", scores.join(", "))?
                }
                Err(failure) => writeln!(f, "FAILED [{}] {}", failure.kind, failure.reason)?,
            }
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} ok, {} failed",
            self.outcomes.len() - failed,
            failed
        )
    }
}

pub struct BatchDriver {
    config: PipelineConfig,
    engine: FeatureEngine,
    store: CsvStore,
    trainer: ModelTrainer,
    source: Arc<dyn HistoricalDataService>,
}

impl BatchDriver {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn HistoricalDataService>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let engine = FeatureEngine::new(config.features.clone())?;
        let store = CsvStore::new(config.storage.clone(), config.source.raw_layout);
        let trainer = ModelTrainer::new(config.training.clone(), config.storage.clone());
        Ok(Self {
            config,
            engine,
            store,
            trainer,
            source,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    fn end_date(&self) -> NaiveDate {
        self.config
            .end_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    pub async fn fetch_all(&self) -> BatchReport {
        self.fetch(&self.config.symbols).await
    }

    pub async fn fetch(&self, symbols: &[String]) -> BatchReport {
        let _timer = StageTimer::start("fetch");
        let (start, end) = (self.config.start_date, self.end_date());
        info!(
            "Fetching {} symbols from {} ({} to {})",
            symbols.len(),
            self.source.name(),
            start,
            end
        );

        let mut report = BatchReport::default();
        for symbol in symbols {
            let result = self.fetch_symbol(symbol, start, end).await;
            report
                .outcomes
                .push(SymbolOutcome::new(symbol, Stage::Fetch, result));
        }
        report
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StageOutput, PipelineError> {
        let bars = self
            .source
            .get_daily_bars(symbol, start, end)
            .await
            .map_err(|e| PipelineError::Fetch {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            })?;
        if bars.is_empty() {
            return Err(PipelineError::Fetch {
                symbol: symbol.to_string(),
                reason: format!("no bars between {} and {}", start, end),
            });
        }
        let path = self.store.write_raw(symbol, &bars)?;
        Ok(StageOutput::Fetched {
            bars: bars.len(),
            path,
        })
    }

    pub fn preprocess_all(&self) -> BatchReport {
        self.preprocess(&self.config.symbols)
    }

    /// Raw CSV -> cleaned series -> feature table -> features CSV.
    pub fn preprocess(&self, symbols: &[String]) -> BatchReport {
        let _timer = StageTimer::start("preprocess");
        let outcomes: Vec<SymbolOutcome> = if self.config.parallel {
            // Indexed collect keeps symbol order
            symbols
                .par_iter()
                .map(|symbol| self.preprocess_one(symbol))
                .collect()
        } else {
            symbols.iter().map(|symbol| self.preprocess_one(symbol)).collect()
        };
        BatchReport { outcomes }
    }

    fn preprocess_one(&self, symbol: &str) -> SymbolOutcome {
        SymbolOutcome::new(symbol, Stage::Preprocess, self.preprocess_symbol(symbol))
    }

    fn preprocess_symbol(&self, symbol: &str) -> Result<StageOutput, PipelineError> {
        let raw = self.store.read_raw(symbol)?;
        let series = SeriesCleaner::clean(symbol, raw)?;
        let table = self.engine.compute(&series)?;
        let path = self.store.write_features(&table)?;
        info!(
            "{}: {} bars -> {} feature rows ({} columns)",
            symbol,
            series.len(),
            table.len(),
            table.schema().len()
        );
        Ok(StageOutput::Preprocessed {
            rows: table.len(),
            path,
        })
    }

    pub fn train_all(&self) -> BatchReport {
        self.train(&self.config.symbols)
    }

    pub fn train(&self, symbols: &[String]) -> BatchReport {
        let _timer = StageTimer::start("train");
        let outcomes: Vec<SymbolOutcome> = symbols
            .iter()
            .map(|symbol| {
                let result = self
                    .store
                    .read_features(symbol)
                    .and_then(|dataset| self.trainer.train(&dataset))
                    .map(StageOutput::Trained);
                SymbolOutcome::new(symbol, Stage::Train, result)
            })
            .collect();
        BatchReport { outcomes }
    }

    /// Fetch, preprocess and train. A symbol that fails a stage is not
    /// passed on to the next one.
    pub async fn run_all(&self) -> BatchReport {
        let mut report = self.fetch_all().await;

        let fetched = report.succeeded(Stage::Fetch);
        let skipped = self.config.symbols.len() - fetched.len();
        if skipped > 0 {
            warn!("{} symbols failed to fetch and are skipped", skipped);
        }
        report.extend(self.preprocess(&fetched));

        let preprocessed = report.succeeded(Stage::Preprocess);
        report.extend(self.train(&preprocessed));
        report
    }
}
