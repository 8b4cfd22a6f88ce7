//! Configuration module for cryptocast.
//!
//! Settings are layered, lowest priority first: built-in defaults, an
//! optional TOML file, environment variables (a `.env` file is honoured by
//! the binaries through `dotenvy`), then CLI flags applied by the caller.

mod feature_config;
mod source_config;
mod storage_config;
mod training_config;

pub use feature_config::{FeatureConfig, FeatureSetKind};
pub use source_config::{RawLayout, SourceConfig};
pub use storage_config::StorageConfig;
pub use training_config::TrainingConfig;

use crate::domain::errors::PipelineError;
use crate::domain::market::symbol::normalize_crypto_symbol;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Where historical bars are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Mock,
    Binance,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "binance" => Ok(Mode::Binance),
            _ => anyhow::bail!("Invalid MODE: {}. Must be 'mock' or 'binance'", s),
        }
    }
}

/// Everything the batch driver needs, passed explicitly rather than read
/// from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: Mode,
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    /// Inclusive; `None` means today (UTC) at fetch time.
    pub end_date: Option<NaiveDate>,
    /// Preprocess series on the rayon pool.
    pub parallel: bool,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Mock,
            symbols: ["BTC/USDT", "ETH/USDT", "BNB/USDT", "SOL/USDT", "XRP/USDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: None,
            parallel: false,
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.normalize_symbols()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config TOML: {}", path.display()))
    }

    /// Parses a TOML document; omitted keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies environment-style overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("MODE") {
            self.mode = Mode::from_str(&mode)?;
        }
        if let Some(symbols) = lookup("PIPELINE_SYMBOLS") {
            self.symbols = parse_symbols(&symbols)?;
        }
        if let Some(date) = lookup("PIPELINE_START_DATE") {
            self.start_date = parse_date("PIPELINE_START_DATE", &date)?;
        }
        if let Some(date) = lookup("PIPELINE_END_DATE") {
            self.end_date = Some(parse_date("PIPELINE_END_DATE", &date)?);
        }
        if let Some(size) = lookup("PIPELINE_TEST_SIZE") {
            self.training.test_size = size
                .trim()
                .parse()
                .with_context(|| format!("Invalid PIPELINE_TEST_SIZE: {}", size))?;
        }
        if let Some(kind) = lookup("PIPELINE_FEATURE_SET") {
            self.features.kind = FeatureSetKind::from_str(&kind)?;
        }
        if let Some(parallel) = lookup("PIPELINE_PARALLEL") {
            self.parallel = parallel
                .trim()
                .parse()
                .with_context(|| format!("Invalid PIPELINE_PARALLEL: {}", parallel))?;
        }
        if let Some(layout) = lookup("PIPELINE_RAW_LAYOUT") {
            self.source.raw_layout = RawLayout::from_str(&layout)?;
        }
        if let Some(dir) = lookup("PIPELINE_DATA_DIR") {
            self.storage = StorageConfig::under(dir);
        }
        if let Some(url) = lookup("BINANCE_BASE_URL") {
            self.source.binance_base_url = url;
        }
        Ok(())
    }

    /// Rewrites `symbols` in `BASE/QUOTE` form, keeping the first of any
    /// repeated entries. TOML files list symbols verbatim, so this runs
    /// after every layer has been applied.
    pub fn normalize_symbols(&mut self) -> Result<()> {
        let symbols = self
            .symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .collect::<Result<Vec<_>>>()?;
        self.symbols = dedup_symbols(symbols);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.symbols.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one symbol is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if normalize_crypto_symbol(symbol).as_deref() != Ok(symbol.as_str())
                || symbol.to_uppercase() != *symbol
            {
                return Err(PipelineError::InvalidConfig(format!(
                    "symbol {} is not in BASE/QUOTE form",
                    symbol
                )));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "symbol {} is listed twice",
                    symbol
                )));
            }
        }
        if let Some(end) = self.end_date
            && end < self.start_date
        {
            return Err(PipelineError::InvalidConfig(format!(
                "end date {} is before start date {}",
                end, self.start_date
            )));
        }
        self.features.validate()?;
        self.training.validate()
    }
}

/// Comma-separated list, each entry upper-cased and normalized to
/// `BASE/QUOTE`. Repeats are dropped.
pub fn parse_symbols(raw: &str) -> Result<Vec<String>> {
    let symbols = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_symbol)
        .collect::<Result<Vec<_>>>()?;
    Ok(dedup_symbols(symbols))
}

fn normalize_symbol(raw: &str) -> Result<String> {
    normalize_crypto_symbol(&raw.trim().to_uppercase()).map_err(|e| anyhow::anyhow!(e))
}

fn dedup_symbols(symbols: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter(|symbol| {
            let first = seen.insert(symbol.clone());
            if !first {
                warn!("Symbol {} is listed more than once, ignoring repeats", symbol);
            }
            first
        })
        .collect()
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid {}: {} (expected YYYY-MM-DD)", key, value))
}
