//! Offline data source producing a deterministic random walk per symbol.

use crate::domain::market::PriceBar;
use crate::domain::ports::HistoricalDataService;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::info;

/// Maximum absolute daily move of the walk.
const DAILY_MOVE: f64 = 0.04;

pub struct MockHistoricalDataService {
    seed: u64,
    failing_symbols: HashSet<String>,
}

impl MockHistoricalDataService {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            failing_symbols: HashSet::new(),
        }
    }

    /// Requests for these symbols fail, as an unreachable exchange would.
    pub fn with_failing_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Same symbol and seed always give the same stream, independent of call order.
    fn rng_for(&self, symbol: &str) -> StdRng {
        // FNV-1a over the symbol keeps the mapping stable across builds
        let hash = symbol.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });
        StdRng::seed_from_u64(self.seed ^ hash)
    }
}

fn base_price(symbol: &str) -> f64 {
    match symbol.split('/').next().unwrap_or(symbol) {
        "BTC" => 30_000.0,
        "ETH" => 2_000.0,
        "BNB" => 300.0,
        "SOL" => 50.0,
        "XRP" => 0.5,
        _ => 100.0,
    }
}

#[async_trait]
impl HistoricalDataService for MockHistoricalDataService {
    async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        if self.failing_symbols.contains(symbol) {
            anyhow::bail!("Mock source: {} is unavailable", symbol);
        }

        let mut rng = self.rng_for(symbol);
        let mut close = base_price(symbol);
        let mut bars = Vec::new();
        let mut date = start;

        while date <= end {
            let open = close;
            close = (open * (1.0 + rng.random_range(-DAILY_MOVE..DAILY_MOVE))).max(f64::MIN_POSITIVE);
            let wick = rng.random_range(0.0..DAILY_MOVE / 2.0);
            bars.push(PriceBar {
                date,
                close,
                open: Some(open),
                high: Some(open.max(close) * (1.0 + wick)),
                low: Some(open.min(close) * (1.0 - wick)),
                volume: Some(rng.random_range(1_000.0..50_000.0)),
            });

            let Some(next) = date.checked_add_days(Days::new(1)) else {
                break;
            };
            date = next;
        }

        info!("Mock source: generated {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
