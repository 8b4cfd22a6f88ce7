use std::fmt;

/// One derived column of the feature table.
///
/// The column order inside a [`FeatureSchema`] is part of the model
/// contract: training reads columns by position after dropping Date, Close
/// and Target, so any reordering changes what a persisted model sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureColumn {
    DailyReturn,
    Ma(usize),
    Ema(usize),
    Macd,
    MacdSignal,
    MacdDiff,
    Volatility(usize),
    Rsi(usize),
    BbMid(usize),
    BbStd(usize),
    BbUpper(usize),
    BbLower(usize),
    BbWidth(usize),
    BbPct(usize),
    VolumeMa(usize),
}

impl FeatureColumn {
    /// Number of closes needed before the column is defined.
    pub fn required_closes(&self) -> usize {
        match *self {
            FeatureColumn::DailyReturn => 2,
            FeatureColumn::Ma(n) | FeatureColumn::VolumeMa(n) => n,
            FeatureColumn::Ema(_)
            | FeatureColumn::Macd
            | FeatureColumn::MacdSignal
            | FeatureColumn::MacdDiff => 1,
            // n returns (or n deltas) need n + 1 closes
            FeatureColumn::Volatility(n) | FeatureColumn::Rsi(n) => n + 1,
            FeatureColumn::BbMid(p)
            | FeatureColumn::BbStd(p)
            | FeatureColumn::BbUpper(p)
            | FeatureColumn::BbLower(p)
            | FeatureColumn::BbWidth(p)
            | FeatureColumn::BbPct(p) => p,
        }
    }

    pub fn name(&self) -> String {
        match *self {
            FeatureColumn::DailyReturn => "Daily_Return".to_string(),
            FeatureColumn::Ma(n) => format!("MA_{}", n),
            FeatureColumn::Ema(n) => format!("EMA_{}", n),
            FeatureColumn::Macd => "MACD".to_string(),
            FeatureColumn::MacdSignal => "MACD_Signal".to_string(),
            FeatureColumn::MacdDiff => "MACD_Diff".to_string(),
            FeatureColumn::Volatility(n) => format!("Volatility_{}", n),
            FeatureColumn::Rsi(n) => format!("RSI_{}", n),
            FeatureColumn::BbMid(_) => "BB_Mid".to_string(),
            FeatureColumn::BbStd(_) => "BB_Std".to_string(),
            FeatureColumn::BbUpper(_) => "BB_Upper".to_string(),
            FeatureColumn::BbLower(_) => "BB_Lower".to_string(),
            FeatureColumn::BbWidth(_) => "BB_Width".to_string(),
            FeatureColumn::BbPct(_) => "BB_Pct".to_string(),
            FeatureColumn::VolumeMa(n) => format!("Volume_MA_{}", n),
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered list of derived columns produced for one series.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(FeatureColumn::name).collect()
    }

    pub fn position(&self, column: FeatureColumn) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    /// Leading rows that can never be fully defined.
    pub fn warmup_rows(&self) -> usize {
        self.columns
            .iter()
            .map(FeatureColumn::required_closes)
            .max()
            .unwrap_or(1)
            .saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(FeatureColumn::Ma(30).name(), "MA_30");
        assert_eq!(FeatureColumn::Volatility(7).name(), "Volatility_7");
        assert_eq!(FeatureColumn::BbPct(20).name(), "BB_Pct");
        assert_eq!(FeatureColumn::VolumeMa(7).to_string(), "Volume_MA_7");
    }

    #[test]
    fn test_warmup_is_governed_by_longest_window() {
        let schema = FeatureSchema::new(vec![
            FeatureColumn::DailyReturn,
            FeatureColumn::Ma(7),
            FeatureColumn::Ma(30),
            FeatureColumn::Volatility(7),
        ]);
        assert_eq!(schema.warmup_rows(), 29);

        let schema = FeatureSchema::new(vec![FeatureColumn::Ma(7), FeatureColumn::Volatility(7)]);
        assert_eq!(schema.warmup_rows(), 7);

        let schema = FeatureSchema::new(vec![FeatureColumn::Ema(12), FeatureColumn::Macd]);
        assert_eq!(schema.warmup_rows(), 0);
    }

    #[test]
    fn test_position_lookup() {
        let schema = FeatureSchema::new(vec![FeatureColumn::Rsi(14), FeatureColumn::Macd]);
        assert_eq!(schema.position(FeatureColumn::Macd), Some(1));
        assert_eq!(schema.position(FeatureColumn::Ma(7)), None);
    }
}
