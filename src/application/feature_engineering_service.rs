//! Turns a validated price series into a table of causal indicator features.
//!
//! All indicators are single-pass state machines. A [`FeatureStream`] feeds
//! each bar through every indicator and yields only the rows on which all of
//! them are defined, so warm-up rows are dropped without a second pass.

use crate::application::market_data::indicators::{
    BollingerEnvelope, BollingerOutput, DailyReturn, RollingMean, RollingVolatility, WindowedRsi,
};
use crate::config::{FeatureConfig, FeatureSetKind};
use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceBar, PriceColumns, PriceSeries};
use crate::domain::ml::{FeatureColumn, FeatureRow, FeatureSchema, FeatureTable};
use ta::Next;
use ta::indicators::{
    ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    MovingAverageConvergenceDivergenceOutput,
};
use tracing::debug;

/// Every indicator a schema needs, each fed once per bar.
#[derive(Debug, Clone)]
pub struct IndicatorBank {
    schema: FeatureSchema,
    daily_return: DailyReturn,
    ma: Vec<(usize, RollingMean)>,
    ema: Vec<(usize, ExponentialMovingAverage)>,
    macd: Option<MovingAverageConvergenceDivergence>,
    volatility: RollingVolatility,
    rsi: Option<WindowedRsi>,
    bollinger: Option<BollingerEnvelope>,
    volume_ma: Option<RollingMean>,
}

/// One bar's raw indicator outputs before they are laid out by the schema.
struct Reading {
    daily_return: Option<f64>,
    ma: Vec<Option<f64>>,
    ema: Vec<f64>,
    macd: Option<MovingAverageConvergenceDivergenceOutput>,
    volatility: Option<f64>,
    rsi: Option<f64>,
    bollinger: Option<BollingerOutput>,
    volume_ma: Option<f64>,
}

impl IndicatorBank {
    pub fn new(config: &FeatureConfig, has_volume: bool) -> Result<Self, PipelineError> {
        let extended = config.kind == FeatureSetKind::Extended;
        let ta_error = |what: &str, e: ta::errors::TaError| {
            PipelineError::InvalidConfig(format!("{}: {:?}", what, e))
        };

        let ema = if extended {
            config
                .ema_windows
                .iter()
                .map(|&n| {
                    ExponentialMovingAverage::new(n)
                        .map(|ema| (n, ema))
                        .map_err(|e| ta_error("EMA window", e))
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        let macd = if extended {
            Some(
                MovingAverageConvergenceDivergence::new(
                    config.macd_fast_period,
                    config.macd_slow_period,
                    config.macd_signal_period,
                )
                .map_err(|e| ta_error("MACD periods", e))?,
            )
        } else {
            None
        };

        Ok(Self {
            schema: config.schema(has_volume),
            daily_return: DailyReturn::new(),
            ma: config
                .ma_windows
                .iter()
                .map(|&n| (n, RollingMean::new(n)))
                .collect(),
            ema,
            macd,
            volatility: RollingVolatility::new(config.volatility_window),
            rsi: extended.then(|| WindowedRsi::new(config.rsi_period)),
            bollinger: extended.then(|| BollingerEnvelope::new(config.bb_period, config.bb_k)),
            volume_ma: (extended && has_volume).then(|| RollingMean::new(config.volume_ma_window)),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Feeds one bar and returns the schema-ordered values, `None` where an
    /// indicator is still warming up.
    pub fn next(&mut self, bar: &PriceBar) -> Vec<Option<f64>> {
        let close = bar.close;
        let reading = Reading {
            daily_return: self.daily_return.next(close),
            ma: self.ma.iter_mut().map(|(_, ma)| ma.next(close)).collect(),
            ema: self.ema.iter_mut().map(|(_, ema)| ema.next(close)).collect(),
            macd: self.macd.as_mut().map(|macd| macd.next(close)),
            volatility: self.volatility.next(close),
            rsi: self.rsi.as_mut().and_then(|rsi| rsi.next(close)),
            bollinger: self.bollinger.as_mut().and_then(|bb| bb.next(close)),
            // A bar without volume leaves the window untouched
            volume_ma: match (self.volume_ma.as_mut(), bar.volume) {
                (Some(ma), Some(volume)) => ma.next(volume),
                _ => None,
            },
        };

        self.schema
            .columns()
            .iter()
            .map(|column| self.lookup(&reading, *column))
            .collect()
    }

    fn lookup(&self, reading: &Reading, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::DailyReturn => reading.daily_return,
            FeatureColumn::Ma(n) => {
                let idx = self.ma.iter().position(|(w, _)| *w == n)?;
                reading.ma[idx]
            }
            FeatureColumn::Ema(n) => {
                let idx = self.ema.iter().position(|(w, _)| *w == n)?;
                Some(reading.ema[idx])
            }
            FeatureColumn::Macd => reading.macd.as_ref().map(|m| m.macd),
            FeatureColumn::MacdSignal => reading.macd.as_ref().map(|m| m.signal),
            FeatureColumn::MacdDiff => reading.macd.as_ref().map(|m| m.histogram),
            FeatureColumn::Volatility(_) => reading.volatility,
            FeatureColumn::Rsi(_) => reading.rsi,
            FeatureColumn::BbMid(_) => reading.bollinger.map(|b| b.mid),
            FeatureColumn::BbStd(_) => reading.bollinger.map(|b| b.std),
            FeatureColumn::BbUpper(_) => reading.bollinger.map(|b| b.upper),
            FeatureColumn::BbLower(_) => reading.bollinger.map(|b| b.lower),
            FeatureColumn::BbWidth(_) => reading.bollinger.map(|b| b.width),
            FeatureColumn::BbPct(_) => reading.bollinger.map(|b| b.pct),
            FeatureColumn::VolumeMa(_) => reading.volume_ma,
        }
    }
}

/// Lazy, single-pass adapter from bars to fully-defined feature rows.
pub struct FeatureStream<I> {
    bars: I,
    bank: IndicatorBank,
}

impl<I> FeatureStream<I> {
    pub fn schema(&self) -> &FeatureSchema {
        self.bank.schema()
    }
}

impl<I: Iterator<Item = PriceBar>> Iterator for FeatureStream<I> {
    type Item = FeatureRow;

    fn next(&mut self) -> Option<Self::Item> {
        for bar in self.bars.by_ref() {
            let values = self.bank.next(&bar);
            if let Some(values) = values.into_iter().collect::<Option<Vec<f64>>>() {
                return Some(FeatureRow { bar, values });
            }
        }
        None
    }
}

/// Batch and streaming entry point for feature computation.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    config: FeatureConfig,
    with_volume: IndicatorBank,
    without_volume: IndicatorBank,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let with_volume = IndicatorBank::new(&config, true)?;
        let without_volume = IndicatorBank::new(&config, false)?;
        Ok(Self {
            config,
            with_volume,
            without_volume,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn schema(&self, columns: PriceColumns) -> &FeatureSchema {
        self.bank_for(columns).schema()
    }

    /// Starts a fresh stream; indicator state never carries over between calls.
    pub fn stream<I>(&self, bars: I, columns: PriceColumns) -> FeatureStream<I::IntoIter>
    where
        I: IntoIterator<Item = PriceBar>,
    {
        FeatureStream {
            bars: bars.into_iter(),
            bank: self.bank_for(columns).clone(),
        }
    }

    /// Computes the whole table for one series.
    ///
    /// A series too short to produce a single fully-defined row is a
    /// data-quality error rather than an empty table.
    pub fn compute(&self, series: &PriceSeries) -> Result<FeatureTable, PipelineError> {
        let columns = series.columns();
        let stream = self.stream(series.bars().iter().cloned(), columns);
        let schema = stream.schema().clone();
        let warmup = schema.warmup_rows();
        let rows: Vec<FeatureRow> = stream.collect();

        if rows.is_empty() {
            return Err(PipelineError::data_quality(
                series.symbol(),
                format!(
                    "insufficient history: {} rows, need at least {}",
                    series.len(),
                    warmup + 1
                ),
            ));
        }

        debug!(
            "{}: {} bars -> {} feature rows ({} columns, warm-up {})",
            series.symbol(),
            series.len(),
            rows.len(),
            schema.len(),
            warmup
        );

        Ok(FeatureTable::new(series.symbol(), schema, columns, rows))
    }

    fn bank_for(&self, columns: PriceColumns) -> &IndicatorBank {
        if columns.volume {
            &self.with_volume
        } else {
            &self.without_volume
        }
    }
}
