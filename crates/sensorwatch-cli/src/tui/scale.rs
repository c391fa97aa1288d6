//! Axis arithmetic for the dual-axis chart.
//!
//! ratatui charts have a single y axis, so humidity is linearly mapped onto
//! the temperature range and its own scale is drawn beside the chart.

use chrono::{DateTime, Local};

/// Closed numeric interval with `min < max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn bounds(&self) -> [f64; 2] {
        [self.min, self.max]
    }

    /// `n` evenly spaced values from `min` to `max` inclusive.
    pub fn ticks(&self, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![self.min],
            _ => (0..n)
                .map(|i| self.min + self.span() * i as f64 / (n - 1) as f64)
                .collect(),
        }
    }
}

/// Widen `(lo, hi)` to at least `min_span`, then pad by `pad` of the span on
/// each side.
pub fn padded_range((lo, hi): (f64, f64), pad: f64, min_span: f64) -> AxisRange {
    let (mut lo, mut hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if hi - lo < min_span {
        let mid = (lo + hi) / 2.0;
        lo = mid - min_span / 2.0;
        hi = mid + min_span / 2.0;
    }
    let margin = (hi - lo) * pad;
    AxisRange {
        min: lo - margin,
        max: hi + margin,
    }
}

/// Map `value` from the `from` scale onto the `to` scale.
pub fn rescale(value: f64, from: AxisRange, to: AxisRange) -> f64 {
    to.min + (value - from.min) / from.span() * to.span()
}

/// Seconds since the first timestamp.
pub fn elapsed_secs(timestamps: &[DateTime<Local>]) -> Vec<f64> {
    let Some(first) = timestamps.first() else {
        return Vec::new();
    };
    timestamps
        .iter()
        .map(|ts| (*ts - *first).num_milliseconds() as f64 / 1000.0)
        .collect()
}

/// Wall-clock labels for the start, middle and end of the x axis.
pub fn time_labels(timestamps: &[DateTime<Local>]) -> Vec<String> {
    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return Vec::new();
    };
    let mid = *first + (*last - *first) / 2;
    [first, &mid, last]
        .iter()
        .map(|ts| ts.format("%H:%M:%S").to_string())
        .collect()
}
