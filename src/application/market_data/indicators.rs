//! Windowed indicators over daily closes.
//!
//! Each indicator is a small state machine fed one value at a time through
//! [`ta::Next`], yielding `None` until its window holds enough history.
//! Exponential averages come straight from `ta`, whose
//! `ExponentialMovingAverage` seeds on the first input and then applies
//! `alpha = 2 / (n + 1)`.

use super::rolling::RollingWindow;
use ta::{Next, Reset};

/// Substituted for a zero average loss in the RSI ratio.
pub const RSI_EPSILON: f64 = 1e-10;

/// Band widths at or below this are treated as a flat band when computing `BB_Pct`.
pub const BB_WIDTH_EPSILON: f64 = 1e-12;

/// Close-to-close percentage change.
#[derive(Debug, Clone, Default)]
pub struct DailyReturn {
    prev_close: Option<f64>,
}

impl DailyReturn {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Next<f64> for DailyReturn {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Self::Output {
        let ret = self.prev_close.map(|prev| (close - prev) / prev);
        self.prev_close = Some(close);
        ret
    }
}

impl Reset for DailyReturn {
    fn reset(&mut self) {
        self.prev_close = None;
    }
}

/// Simple moving average over exactly `period` observations.
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: RollingWindow,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        Self {
            window: RollingWindow::new(period),
        }
    }
}

impl Next<f64> for RollingMean {
    type Output = Option<f64>;

    fn next(&mut self, value: f64) -> Self::Output {
        self.window.push(value);
        if self.window.is_full() {
            self.window.mean()
        } else {
            None
        }
    }
}

impl Reset for RollingMean {
    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Sample standard deviation of the trailing `period` daily returns.
#[derive(Debug, Clone)]
pub struct RollingVolatility {
    returns: DailyReturn,
    window: RollingWindow,
}

impl RollingVolatility {
    pub fn new(period: usize) -> Self {
        Self {
            returns: DailyReturn::new(),
            window: RollingWindow::new(period),
        }
    }
}

impl Next<f64> for RollingVolatility {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Self::Output {
        let ret = self.returns.next(close)?;
        self.window.push(ret);
        if self.window.is_full() {
            self.window.sample_std_dev()
        } else {
            None
        }
    }
}

impl Reset for RollingVolatility {
    fn reset(&mut self) {
        self.returns.reset();
        self.window.clear();
    }
}

/// RSI built from simple means of gains and losses over the trailing window.
///
/// Unlike Wilder's smoothed variant, every value depends only on the last
/// `period` deltas.
#[derive(Debug, Clone)]
pub struct WindowedRsi {
    prev_close: Option<f64>,
    gains: RollingWindow,
    losses: RollingWindow,
}

impl WindowedRsi {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            gains: RollingWindow::new(period),
            losses: RollingWindow::new(period),
        }
    }
}

impl Next<f64> for WindowedRsi {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Self::Output {
        let prev = self.prev_close.replace(close)?;
        let delta = close - prev;
        self.gains.push(delta.max(0.0));
        self.losses.push((-delta).max(0.0));

        if !self.gains.is_full() {
            return None;
        }
        Some(rsi_from_averages(self.gains.mean()?, self.losses.mean()?))
    }
}

impl Reset for WindowedRsi {
    fn reset(&mut self) {
        self.prev_close = None;
        self.gains.clear();
        self.losses.clear();
    }
}

/// `100 - 100 / (1 + gain / loss)`.
///
/// A zero loss is replaced by [`RSI_EPSILON`], which pushes the result
/// towards 100 whenever there was any gain. A window with neither gains nor
/// losses (a perfectly flat market) returns exactly 50.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    let loss = if avg_loss == 0.0 { RSI_EPSILON } else { avg_loss };
    let rs = avg_gain / loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// One Bollinger reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub mid: f64,
    pub std: f64,
    pub upper: f64,
    pub lower: f64,
    pub width: f64,
    /// Position of the close inside the band; 0.5 for a flat band
    pub pct: f64,
}

/// Bollinger Bands: rolling mean plus/minus `k` sample standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerEnvelope {
    window: RollingWindow,
    k: f64,
}

impl BollingerEnvelope {
    pub fn new(period: usize, k: f64) -> Self {
        Self {
            window: RollingWindow::new(period),
            k,
        }
    }
}

impl Next<f64> for BollingerEnvelope {
    type Output = Option<BollingerOutput>;

    fn next(&mut self, close: f64) -> Self::Output {
        self.window.push(close);
        if !self.window.is_full() {
            return None;
        }

        let mid = self.window.mean()?;
        let std = self.window.sample_std_dev()?;
        let upper = mid + self.k * std;
        let lower = mid - self.k * std;
        let width = upper - lower;
        let pct = if width > BB_WIDTH_EPSILON {
            (close - lower) / width
        } else {
            0.5
        };

        Some(BollingerOutput {
            mid,
            std,
            upper,
            lower,
            width,
            pct,
        })
    }
}

impl Reset for BollingerEnvelope {
    fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ta::indicators::ExponentialMovingAverage;

    #[test]
    fn test_daily_return() {
        let mut ret = DailyReturn::new();
        assert_eq!(ret.next(100.0), None);
        assert_eq!(ret.next(110.0), Some(0.1));
        assert!((ret.next(99.0).unwrap() + 0.1).abs() < 1e-12);
        ret.reset();
        assert_eq!(ret.next(50.0), None);
    }

    #[test]
    fn test_rolling_mean_warmup() {
        let mut ma = RollingMean::new(3);
        assert_eq!(ma.next(1.0), None);
        assert_eq!(ma.next(2.0), None);
        assert_eq!(ma.next(3.0), Some(2.0));
        assert_eq!(ma.next(7.0), Some(4.0));
    }

    #[test]
    fn test_volatility_needs_period_returns() {
        let mut vol = RollingVolatility::new(2);
        assert_eq!(vol.next(100.0), None);
        assert_eq!(vol.next(110.0), None); // one return
        let v = vol.next(99.0).unwrap(); // returns 0.1 and -0.1
        let expected = (0.02_f64).sqrt(); // sample std of [0.1, -0.1]
        assert!((v - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_bounds_and_extremes() {
        let mut rsi = WindowedRsi::new(3);
        for close in [10.0, 11.0, 12.0] {
            assert_eq!(rsi.next(close), None);
        }
        // Three gains, no loss: epsilon guard drives RSI to ~100
        let up = rsi.next(13.0).unwrap();
        assert!(up > 99.999 && up <= 100.0);

        let mut rsi = WindowedRsi::new(3);
        let mut last = None;
        for close in [13.0, 12.0, 11.0, 10.0] {
            last = rsi.next(close);
        }
        assert_eq!(last, Some(0.0));
    }

    #[test]
    fn test_rsi_mixed_window() {
        let mut rsi = WindowedRsi::new(2);
        rsi.next(10.0);
        rsi.next(12.0); // +2
        let value = rsi.next(11.0).unwrap(); // -1 -> gain 1.0, loss 0.5
        assert!((value - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_flat_market_is_fifty() {
        assert_eq!(rsi_from_averages(0.0, 0.0), 50.0);
        let mut rsi = WindowedRsi::new(14);
        let mut last = None;
        for _ in 0..20 {
            last = rsi.next(42.0);
        }
        assert_eq!(last, Some(50.0));
    }

    #[test]
    fn test_bollinger_ordering_and_flat_band() {
        let mut bb = BollingerEnvelope::new(4, 2.0);
        let mut out = None;
        for close in [10.0, 12.0, 11.0, 13.0] {
            out = bb.next(close);
        }
        let out = out.unwrap();
        assert!(out.upper >= out.mid && out.mid >= out.lower);
        assert!((out.mid - 11.5).abs() < 1e-12);
        assert!((out.width - 4.0 * out.std).abs() < 1e-12);

        let mut flat = BollingerEnvelope::new(3, 2.0);
        let mut out = None;
        for _ in 0..3 {
            out = flat.next(5.0);
        }
        let out = out.unwrap();
        assert_eq!(out.width, 0.0);
        assert_eq!(out.pct, 0.5);
    }

    #[test]
    fn test_ta_ema_matches_seeded_recurrence() {
        let mut ema = ExponentialMovingAverage::new(3).unwrap();
        assert_eq!(ema.next(10.0), 10.0);
        // alpha = 0.5
        assert!((ema.next(20.0) - 15.0).abs() < 1e-12);
        assert!((ema.next(5.0) - 10.0).abs() < 1e-12);
    }
}
