//! Binance daily history.
//!
//! Pages through `/api/v3/klines?interval=1d` 1000 candles at a time until
//! the requested range is covered.

use crate::domain::market::PriceBar;
use crate::domain::market::symbol::denormalize_crypto_symbol;
use crate::domain::ports::HistoricalDataService;
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Binance caps one klines response at this many candles.
pub const KLINES_PAGE_LIMIT: usize = 1000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Non-success HTTP answer from the klines endpoint.
#[derive(Debug, thiserror::Error)]
#[error("Binance klines fetch failed ({status}): {body}")]
pub struct KlinesHttpError {
    pub status: StatusCode,
    pub body: String,
}

impl KlinesHttpError {
    /// 5xx and 429 say the exchange is struggling. Other statuses (unknown
    /// symbol, bad range) are about the request and say nothing about it.
    pub fn is_transient(&self) -> bool {
        self.status.is_server_error() || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// Only transport failures and transient statuses count against the breaker.
fn trips_breaker(e: &anyhow::Error) -> bool {
    e.downcast_ref::<KlinesHttpError>()
        .is_none_or(KlinesHttpError::is_transient)
}

pub struct BinanceHistoricalDataService {
    client: ClientWithMiddleware,
    base_url: String,
    circuit_breaker: CircuitBreaker,
}

impl BinanceHistoricalDataService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            circuit_breaker: CircuitBreaker::new(
                "BinanceKlines",
                5,
                2,
                Duration::from_secs(60),
            ),
        }
    }

    async fn fetch_page(
        &self,
        api_symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PriceBar>> {
        let start_ms = start_ms.to_string();
        let end_ms = end_ms.to_string();
        let limit = KLINES_PAGE_LIMIT.to_string();
        let url = build_url_with_query(
            &format!("{}/api/v3/klines", self.base_url),
            &[
                ("symbol", api_symbol),
                ("interval", "1d"),
                ("startTime", start_ms.as_str()),
                ("endTime", end_ms.as_str()),
                ("limit", limit.as_str()),
            ],
        );

        self.circuit_breaker
            .call_counting(async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .context("Failed to fetch klines from Binance")?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(KlinesHttpError { status, body }.into());
                }

                let klines: Vec<serde_json::Value> = response
                    .json()
                    .await
                    .context("Failed to parse Binance klines response")?;

                Ok::<_, anyhow::Error>(parse_daily_klines(&klines))
            }, trips_breaker)
            .await
            .map_err(|e| match e {
                CircuitBreakerError::Open(msg) => {
                    anyhow::anyhow!("Binance klines circuit breaker open: {}", msg)
                }
                CircuitBreakerError::Inner(inner) => inner,
            })
    }
}

#[async_trait]
impl HistoricalDataService for BinanceHistoricalDataService {
    async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let api_symbol = denormalize_crypto_symbol(symbol);
        let end_ms = day_start_ms(end) + DAY_MS - 1;
        let mut cursor = day_start_ms(start);
        let mut bars: Vec<PriceBar> = Vec::new();

        while cursor <= end_ms {
            let page = self
                .fetch_page(&api_symbol, cursor, end_ms)
                .await
                .with_context(|| format!("klines page starting {} for {}", cursor, symbol))?;
            debug!("Binance: {} page at {} -> {} candles", symbol, cursor, page.len());

            let Some(last) = page.last() else {
                break;
            };
            let next_cursor = day_start_ms(last.date) + DAY_MS;
            let full_page = page.len() >= KLINES_PAGE_LIMIT;

            // Overlapping pages must not produce duplicate dates
            let last_seen = bars.last().map(|b| b.date);
            bars.extend(page.into_iter().filter(|b| last_seen.is_none_or(|d| b.date > d)));

            if !full_page || next_cursor <= cursor {
                break;
            }
            cursor = next_cursor;
        }

        if bars.is_empty() {
            warn!("Binance: no candles for {} between {} and {}", symbol, start, end);
        }
        info!("Binance: fetched {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    fn name(&self) -> &str {
        "binance"
    }
}

fn day_start_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Converts raw kline arrays `[openTime, open, high, low, close, volume, ...]`
/// into daily bars. Malformed entries are skipped.
pub fn parse_daily_klines(klines: &[serde_json::Value]) -> Vec<PriceBar> {
    klines
        .iter()
        .filter_map(|k| {
            let arr = k.as_array()?;
            if arr.len() < 6 {
                return None;
            }
            let number = |idx: usize| arr[idx].as_str()?.parse::<f64>().ok();

            let open_time = arr[0].as_i64()?;
            let date = DateTime::from_timestamp_millis(open_time)?.date_naive();

            Some(PriceBar {
                date,
                close: number(4)?,
                open: number(1),
                high: number(2),
                low: number(3),
                volume: number(5),
            })
        })
        .collect()
}
