use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceBar, PriceSeries};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// A row as read from storage, before cleaning. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl RawBar {
    fn same_content(&self, other: &RawBar) -> bool {
        fn bits(v: Option<f64>) -> Option<u64> {
            v.map(f64::to_bits)
        }
        self.date == other.date
            && bits(self.close) == bits(other.close)
            && bits(self.open) == bits(other.open)
            && bits(self.high) == bits(other.high)
            && bits(self.low) == bits(other.low)
            && bits(self.volume) == bits(other.volume)
    }
}

/// Turns raw rows into a validated [`PriceSeries`].
///
/// Steps, in order: stable sort by date, collapse exact duplicate rows,
/// forward-fill missing values from the previous row, drop leading rows that
/// still have no close. Whatever remains must satisfy the `PriceSeries`
/// invariants; a date that still appears twice with different values is a
/// data-quality error.
pub struct SeriesCleaner;

impl SeriesCleaner {
    pub fn clean(symbol: &str, mut raw: Vec<RawBar>) -> Result<PriceSeries, PipelineError> {
        let input_rows = raw.len();
        raw.sort_by_key(|r| r.date);
        raw.dedup_by(|later, earlier| later.same_content(earlier));
        let duplicates = input_rows - raw.len();
        if duplicates > 0 {
            debug!("{}: collapsed {} duplicate rows", symbol, duplicates);
        }

        let mut last = RawBar {
            date: NaiveDate::MIN,
            close: None,
            open: None,
            high: None,
            low: None,
            volume: None,
        };
        let mut filled = 0usize;
        let mut bars = Vec::with_capacity(raw.len());

        for row in raw {
            let fill = |value: Option<f64>, previous: Option<f64>, filled: &mut usize| match value {
                Some(v) => Some(v),
                None => {
                    if previous.is_some() {
                        *filled += 1;
                    }
                    previous
                }
            };

            let current = RawBar {
                date: row.date,
                close: fill(row.close, last.close, &mut filled),
                open: fill(row.open, last.open, &mut filled),
                high: fill(row.high, last.high, &mut filled),
                low: fill(row.low, last.low, &mut filled),
                volume: fill(row.volume, last.volume, &mut filled),
            };

            if let Some(close) = current.close {
                let bar = PriceBar {
                    date: current.date,
                    close,
                    open: current.open,
                    high: current.high,
                    low: current.low,
                    volume: current.volume,
                };
                Self::inspect_bar(symbol, &bar);
                bars.push(bar);
            }
            last = current;
        }

        if filled > 0 {
            warn!("{}: forward-filled {} missing values", symbol, filled);
        }

        if bars.is_empty() {
            return Err(PipelineError::data_quality(
                symbol,
                format!("empty after cleaning ({} input rows)", input_rows),
            ));
        }

        let dropped = input_rows - duplicates - bars.len();
        if dropped > 0 {
            warn!("{}: dropped {} leading rows without a close", symbol, dropped);
        }

        PriceSeries::new(symbol, bars)
    }

    /// Flags suspect but usable bars.
    fn inspect_bar(symbol: &str, bar: &PriceBar) {
        if let (Some(low), Some(high)) = (bar.low, bar.high)
            && low > high
        {
            warn!(
                "Validation: {} on {} has low {} > high {}",
                symbol, bar.date, low, high
            );
        }
        if let Some(volume) = bar.volume
            && volume < 0.0
        {
            warn!(
                "Validation: {} on {} has negative volume: {}",
                symbol, bar.date, volume
            );
        }
    }
}
