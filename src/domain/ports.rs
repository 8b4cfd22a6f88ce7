use crate::domain::market::PriceBar;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of daily history for one symbol.
#[async_trait]
pub trait HistoricalDataService: Send + Sync {
    /// Daily bars with `start <= date <= end`, ascending.
    async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}
