//! Close-price line chart drawn with block characters.

use crate::domain::market::PriceSeries;

/// One-eighth steps of a character cell, bottom to top.
const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const AXIS_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct TerminalChart {
    width: usize,
    height: usize,
}

impl Default for TerminalChart {
    fn default() -> Self {
        Self::new(80, 20)
    }
}

impl TerminalChart {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(2),
            height: height.max(1),
        }
    }

    /// Title line, `height` plot rows, x axis and a date line.
    ///
    /// With more bars than columns each column shows the mean close of its bucket.
    pub fn render(&self, series: &PriceSeries) -> String {
        let closes = series.closes();
        let columns = bucket_means(&closes, self.width);
        let bars = series.bars();

        let min = columns.iter().copied().fold(f64::INFINITY, f64::min);
        let max = columns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        let steps = self.height * LEVELS.len();

        // Column heights in eighths of a cell, at least one so every column shows
        let heights: Vec<usize> = columns
            .iter()
            .map(|&v| {
                if range <= 0.0 {
                    steps / 2
                } else {
                    ((v - min) / range * steps as f64).round() as usize
                }
                .clamp(1, steps)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&format!(
            "{} close, {} bars, min {:.2} max {:.2}\n",
            series.symbol(),
            bars.len(),
            min,
            max
        ));

        for row in (0..self.height).rev() {
            let label = if row + 1 == self.height {
                format!("{:>width$.2}", max, width = AXIS_WIDTH)
            } else if row == 0 {
                format!("{:>width$.2}", min, width = AXIS_WIDTH)
            } else {
                " ".repeat(AXIS_WIDTH)
            };
            out.push_str(&label);
            out.push_str(" │");

            let floor = row * LEVELS.len();
            for &h in &heights {
                let cell = if h >= floor + LEVELS.len() {
                    LEVELS[LEVELS.len() - 1]
                } else if h > floor {
                    LEVELS[h - floor - 1]
                } else {
                    ' '
                };
                out.push(cell);
            }
            out.push('\n');
        }

        out.push_str(&" ".repeat(AXIS_WIDTH));
        out.push_str(" └");
        out.push_str(&"─".repeat(heights.len()));
        out.push('\n');

        if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
            let start = first.date.to_string();
            let end = last.date.to_string();
            let gap = (heights.len() + 2).saturating_sub(start.len() + end.len()).max(1);
            out.push_str(&" ".repeat(AXIS_WIDTH));
            out.push_str(&start);
            out.push_str(&" ".repeat(gap));
            out.push_str(&end);
            out.push('\n');
        }
        out
    }
}

/// Splits `values` into at most `buckets` contiguous chunks and averages each.
fn bucket_means(values: &[f64], buckets: usize) -> Vec<f64> {
    let n = values.len();
    let buckets = buckets.min(n);
    (0..buckets)
        .map(|j| {
            let chunk = &values[j * n / buckets..(j + 1) * n / buckets];
            chunk.iter().sum::<f64>() / chunk.len() as f64
        })
        .collect()
}
