use crate::domain::market::{PriceBar, PriceColumns};
use crate::domain::ml::feature_registry::FeatureSchema;

/// A price bar plus its fully-defined derived values, ordered as the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub bar: PriceBar,
    pub values: Vec<f64>,
}

/// Feature rows for one symbol, produced once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    symbol: String,
    schema: FeatureSchema,
    price_columns: PriceColumns,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(
        symbol: impl Into<String>,
        schema: FeatureSchema,
        price_columns: PriceColumns,
        rows: Vec<FeatureRow>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            schema,
            price_columns,
            rows,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn price_columns(&self) -> PriceColumns {
        self.price_columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full header: Date, retained price columns, derived columns.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["Date".to_string()];
        header.extend(self.price_columns.names().into_iter().map(str::to_string));
        header.extend(self.schema.names());
        header
    }

    /// Values of one derived column across all rows.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.schema.names().iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }
}

/// A persisted feature table read back for training: every column except
/// Date and Close is a model input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDataset {
    pub symbol: String,
    pub feature_names: Vec<String>,
    pub dates: Vec<chrono::NaiveDate>,
    pub closes: Vec<f64>,
    /// Row-major, one inner vector per date.
    pub features: Vec<Vec<f64>>,
}

impl FeatureDataset {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::FeatureColumn;
    use chrono::NaiveDate;

    fn table() -> FeatureTable {
        let mut bar = PriceBar::from_close(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 10.0);
        bar.volume = Some(3.0);
        let schema = FeatureSchema::new(vec![FeatureColumn::DailyReturn, FeatureColumn::Ma(2)]);
        let columns = PriceColumns::of(std::slice::from_ref(&bar));
        FeatureTable::new(
            "BTC/USDT",
            schema,
            columns,
            vec![FeatureRow {
                bar,
                values: vec![0.5, 9.0],
            }],
        )
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(
            table().header(),
            vec!["Date", "Close", "Volume", "Daily_Return", "MA_2"]
        );
    }

    #[test]
    fn test_column_lookup() {
        let table = table();
        assert_eq!(table.column("MA_2"), Some(vec![9.0]));
        assert_eq!(table.column("Close"), None);
    }
}
