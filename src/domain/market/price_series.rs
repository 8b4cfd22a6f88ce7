use crate::domain::errors::PipelineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day. Close is mandatory, the other fields depend on the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceBar {
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }
}

/// Which optional price columns are present on every bar of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceColumns {
    pub open: bool,
    pub high: bool,
    pub low: bool,
    pub volume: bool,
}

impl PriceColumns {
    pub fn of(bars: &[PriceBar]) -> Self {
        if bars.is_empty() {
            return Self::default();
        }
        Self {
            open: bars.iter().all(|b| b.open.is_some()),
            high: bars.iter().all(|b| b.high.is_some()),
            low: bars.iter().all(|b| b.low.is_some()),
            volume: bars.iter().all(|b| b.volume.is_some()),
        }
    }

    /// Column names in output order, Close first.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = vec!["Close"];
        if self.open {
            names.push("Open");
        }
        if self.high {
            names.push("High");
        }
        if self.low {
            names.push("Low");
        }
        if self.volume {
            names.push("Volume");
        }
        names
    }

    /// Values of the retained columns for one bar, matching `names()`.
    pub fn values(&self, bar: &PriceBar) -> Vec<f64> {
        let mut values = vec![bar.close];
        for (keep, value) in [
            (self.open, bar.open),
            (self.high, bar.high),
            (self.low, bar.low),
            (self.volume, bar.volume),
        ] {
            if keep {
                values.push(value.unwrap_or(f64::NAN));
            }
        }
        values
    }
}

/// Validated daily series for one symbol.
///
/// Invariants: at least one bar, dates strictly increasing, every close
/// positive and finite.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
    columns: PriceColumns,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, PipelineError> {
        let symbol = symbol.into();

        if bars.is_empty() {
            return Err(PipelineError::data_quality(&symbol, "series is empty"));
        }

        for bar in &bars {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(PipelineError::data_quality(
                    &symbol,
                    format!("close {} on {} is not a positive number", bar.close, bar.date),
                ));
            }
        }

        for pair in bars.windows(2) {
            if pair[1].date == pair[0].date {
                return Err(PipelineError::data_quality(
                    &symbol,
                    format!("duplicate date {}", pair[1].date),
                ));
            }
            if pair[1].date < pair[0].date {
                return Err(PipelineError::data_quality(
                    &symbol,
                    format!("dates out of order: {} after {}", pair[1].date, pair[0].date),
                ));
            }
        }

        let columns = PriceColumns::of(&bars);
        Ok(Self {
            symbol,
            bars,
            columns,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn columns(&self) -> PriceColumns {
        self.columns
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_valid_series() {
        let bars = vec![
            PriceBar::from_close(day(1), 100.0),
            PriceBar::from_close(day(2), 101.0),
        ];
        let series = PriceSeries::new("BTC/USDT", bars).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.columns().names(), vec!["Close"]);
    }

    #[test]
    fn test_rejects_duplicate_dates() {
        let bars = vec![
            PriceBar::from_close(day(1), 100.0),
            PriceBar::from_close(day(1), 101.0),
        ];
        let err = PriceSeries::new("BTC/USDT", bars).unwrap_err();
        assert!(err.to_string().contains("duplicate date"));
    }

    #[test]
    fn test_rejects_unsorted_and_non_positive() {
        let unsorted = vec![
            PriceBar::from_close(day(2), 100.0),
            PriceBar::from_close(day(1), 101.0),
        ];
        assert!(PriceSeries::new("X", unsorted).is_err());

        let negative = vec![PriceBar::from_close(day(1), -1.0)];
        assert!(PriceSeries::new("X", negative).is_err());

        let nan = vec![PriceBar::from_close(day(1), f64::NAN)];
        assert!(PriceSeries::new("X", nan).is_err());

        assert!(PriceSeries::new("X", Vec::new()).is_err());
    }

    #[test]
    fn test_columns_require_every_bar() {
        let mut first = PriceBar::from_close(day(1), 100.0);
        first.volume = Some(10.0);
        first.open = Some(99.0);
        let mut second = PriceBar::from_close(day(2), 101.0);
        second.volume = Some(12.0);

        let columns = PriceColumns::of(&[first.clone(), second]);
        assert!(columns.volume);
        assert!(!columns.open);
        assert_eq!(columns.names(), vec!["Close", "Volume"]);
        assert_eq!(columns.values(&first), vec![100.0, 10.0]);
    }
}
