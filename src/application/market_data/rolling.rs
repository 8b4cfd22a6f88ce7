//! Fixed-capacity ring buffer backing every windowed indicator.

use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// The most recent `capacity` observations, oldest first.
///
/// Statistics are recomputed from the buffered values on each call rather
/// than from a running sum, so a window of identical values yields exactly
/// that value as its mean and exactly zero as its spread.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    data: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingWindow capacity must be > 0");
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, returning the evicted one once the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.data.len() == self.capacity {
            self.data.pop_front()
        } else {
            None
        };
        self.data.push_back(value);
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    /// Arithmetic mean, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    /// Sample (n - 1) standard deviation, `None` with fewer than 2 values.
    pub fn sample_std_dev(&self) -> Option<f64> {
        if self.data.len() < 2 {
            return None;
        }
        let std_dev = self.data.iter().std_dev();
        if std_dev.is_nan() { None } else { Some(std_dev) }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
