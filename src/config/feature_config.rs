//! Indicator windows and the choice of feature set.

use crate::domain::errors::PipelineError;
use crate::domain::ml::{FeatureColumn, FeatureSchema};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which group of derived columns the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSetKind {
    /// Daily_Return, the MA windows and Volatility only.
    Basic,
    /// Every indicator: adds EMA, MACD, RSI, Bollinger Bands and Volume_MA.
    #[default]
    Extended,
}

impl FromStr for FeatureSetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(FeatureSetKind::Basic),
            "extended" => Ok(FeatureSetKind::Extended),
            _ => anyhow::bail!(
                "Invalid feature set: {}. Must be 'basic' or 'extended'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub kind: FeatureSetKind,
    pub ma_windows: Vec<usize>,
    pub ema_windows: Vec<usize>,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub volatility_window: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_k: f64,
    pub volume_ma_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            kind: FeatureSetKind::Extended,
            ma_windows: vec![7, 30],
            ema_windows: vec![12, 26],
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            volatility_window: 7,
            rsi_period: 14,
            bb_period: 20,
            bb_k: 2.0,
            volume_ma_window: 7,
        }
    }
}

impl FeatureConfig {
    pub fn basic() -> Self {
        Self {
            kind: FeatureSetKind::Basic,
            ..Self::default()
        }
    }

    /// Columns in output order. `Volume_MA` is only listed when the series
    /// carries volume on every bar.
    pub fn schema(&self, has_volume: bool) -> FeatureSchema {
        let mut columns = vec![FeatureColumn::DailyReturn];
        columns.extend(self.ma_windows.iter().map(|&n| FeatureColumn::Ma(n)));

        if self.kind == FeatureSetKind::Extended {
            columns.extend(self.ema_windows.iter().map(|&n| FeatureColumn::Ema(n)));
            columns.extend([
                FeatureColumn::Macd,
                FeatureColumn::MacdSignal,
                FeatureColumn::MacdDiff,
            ]);
        }

        columns.push(FeatureColumn::Volatility(self.volatility_window));

        if self.kind == FeatureSetKind::Extended {
            let p = self.bb_period;
            columns.push(FeatureColumn::Rsi(self.rsi_period));
            columns.extend([
                FeatureColumn::BbMid(p),
                FeatureColumn::BbStd(p),
                FeatureColumn::BbUpper(p),
                FeatureColumn::BbLower(p),
                FeatureColumn::BbWidth(p),
                FeatureColumn::BbPct(p),
            ]);
            if has_volume {
                columns.push(FeatureColumn::VolumeMa(self.volume_ma_window));
            }
        }

        FeatureSchema::new(columns)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.ma_windows.iter().chain(&self.ema_windows).any(|&n| n == 0) {
            return invalid("moving average windows must be > 0".to_string());
        }
        for (name, windows) in [
            ("ma_windows", &self.ma_windows),
            ("ema_windows", &self.ema_windows),
        ] {
            if let Some(n) = windows
                .iter()
                .enumerate()
                .find_map(|(i, n)| windows[..i].contains(n).then_some(n))
            {
                return invalid(format!("{} lists window {} twice", name, n));
            }
        }
        for (name, value) in [
            ("volatility_window", self.volatility_window),
            ("rsi_period", self.rsi_period),
            ("macd_fast_period", self.macd_fast_period),
            ("macd_slow_period", self.macd_slow_period),
            ("macd_signal_period", self.macd_signal_period),
            ("volume_ma_window", self.volume_ma_window),
        ] {
            if value == 0 {
                return invalid(format!("{} must be > 0", name));
            }
        }
        // A single close has no sample standard deviation
        if self.bb_period < 2 {
            return invalid(format!("bb_period must be >= 2, got {}", self.bb_period));
        }
        if self.volatility_window < 2 {
            return invalid(format!(
                "volatility_window must be >= 2, got {}",
                self.volatility_window
            ));
        }
        if !self.bb_k.is_finite() || self.bb_k <= 0.0 {
            return invalid(format!("bb_k must be a positive number, got {}", self.bb_k));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_windows_rejected() {
        let config = FeatureConfig {
            ma_windows: vec![7, 30, 7],
            ..FeatureConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ma_windows lists window 7 twice"));
    }

    #[test]
    fn test_basic_schema_matches_legacy_columns() {
        let schema = FeatureConfig::basic().schema(true);
        assert_eq!(
            schema.names(),
            vec!["Daily_Return", "MA_7", "MA_30", "Volatility_7"]
        );
        assert_eq!(schema.warmup_rows(), 29);
    }

    #[test]
    fn test_extended_schema_order() {
        let schema = FeatureConfig::default().schema(true);
        let names = schema.names();
        assert_eq!(names.first().map(String::as_str), Some("Daily_Return"));
        assert_eq!(names.last().map(String::as_str), Some("Volume_MA_7"));
        assert_eq!(names.len(), 17);
        assert_eq!(schema.warmup_rows(), 29);

        let without_volume = FeatureConfig::default().schema(false);
        assert!(!without_volume.names().contains(&"Volume_MA_7".to_string()));
    }

    #[test]
    fn test_feature_set_from_str() {
        assert_eq!("BASIC".parse::<FeatureSetKind>().unwrap(), FeatureSetKind::Basic);
        assert!("full".parse::<FeatureSetKind>().is_err());
    }

    #[test]
    fn test_validation() {
        assert!(FeatureConfig::default().validate().is_ok());

        let mut config = FeatureConfig::default();
        config.ma_windows = vec![7, 0];
        assert!(config.validate().is_err());

        let mut config = FeatureConfig::default();
        config.bb_period = 1;
        assert!(config.validate().is_err());

        let mut config = FeatureConfig::default();
        config.bb_k = f64::NAN;
        assert!(config.validate().is_err());
    }
}
