//! Bounded, thread-safe sliding window of recent samples.
//!
//! The window is the only state shared between the ingest worker (writer) and
//! the render loop or HTTP handlers (readers). Every access goes through one
//! mutex and holds it only for the bookkeeping itself: append + evict, or a
//! full copy. Readers never hold the lock while rendering.
//!
//! Samples are stored as whole records, so the timestamp, temperature and
//! humidity of one observation are always written and copied together.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::sample::Sample;

/// Default number of samples retained.
pub const DEFAULT_MAX_POINTS: usize = 100;

/// Fixed-capacity FIFO of samples in arrival order.
pub struct SampleWindow {
    capacity: usize,
    samples: Mutex<VecDeque<Sample>>,
}

impl SampleWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of samples retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, evicting the oldest entries past capacity.
    ///
    /// Returns the number of samples evicted.
    pub fn append(&self, sample: Sample) -> usize {
        let mut samples = self.lock();
        samples.push_back(sample);
        let mut evicted = 0;
        while samples.len() > self.capacity {
            samples.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Copy the current contents into an independent snapshot.
    pub fn snapshot(&self) -> WindowSnapshot {
        let samples = self.lock();
        let mut snap = WindowSnapshot::with_capacity(samples.len());
        for s in samples.iter() {
            snap.push(*s);
        }
        snap
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<Sample> {
        self.lock().back().copied()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic elsewhere while holding the lock cannot leave a half-written
    // record behind, so a poisoned guard is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Independent copy of the window as three aligned sequences.
///
/// Index `i` of each vector refers to the same sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowSnapshot {
    pub timestamps: Vec<DateTime<Local>>,
    pub temperatures: Vec<f64>,
    pub humidities: Vec<f64>,
}

impl WindowSnapshot {
    fn with_capacity(n: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(n),
            temperatures: Vec::with_capacity(n),
            humidities: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, s: Sample) {
        self.timestamps.push(s.timestamp());
        self.temperatures.push(s.temperature());
        self.humidities.push(s.humidity());
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Rebuild the samples in order.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.timestamps
            .iter()
            .zip(&self.temperatures)
            .zip(&self.humidities)
            .map(|((&ts, &t), &h)| Sample::at(ts, t, h))
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples().last()
    }

    /// Keep only the newest `n` samples.
    pub fn tail(&self, n: usize) -> WindowSnapshot {
        let skip = self.len().saturating_sub(n);
        let mut out = WindowSnapshot::with_capacity(self.len() - skip);
        for s in self.samples().skip(skip) {
            out.push(s);
        }
        out
    }

    /// (min, max) temperature, `None` when empty.
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        min_max(&self.temperatures)
    }

    /// (min, max) humidity, `None` when empty.
    pub fn humidity_range(&self) -> Option<(f64, f64)> {
        min_max(&self.humidities)
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample(i: i64) -> Sample {
        let base = Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Sample::at(base + Duration::seconds(i), 20.0 + i as f64, 50.0 + i as f64)
    }

    #[test]
    fn new_window_is_empty() {
        let w = SampleWindow::new(10);
        assert!(w.is_empty());
        assert_eq!(w.len(), 0);
        assert!(w.snapshot().is_empty());
        assert!(w.latest().is_none());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let w = SampleWindow::new(0);
        assert_eq!(w.capacity(), 1);
        w.append(sample(0));
        w.append(sample(1));
        assert_eq!(w.len(), 1);
        assert_eq!(w.latest(), Some(sample(1)));
    }

    #[test]
    fn default_capacity() {
        assert_eq!(SampleWindow::default().capacity(), DEFAULT_MAX_POINTS);
    }

    #[test]
    fn length_is_min_of_appends_and_capacity() {
        let cap = 7;
        let w = SampleWindow::new(cap);
        for n in 1..=20 {
            w.append(sample(n as i64));
            assert_eq!(w.len(), n.min(cap), "after {n} appends");
        }
    }

    #[test]
    fn append_reports_evictions() {
        let w = SampleWindow::new(2);
        assert_eq!(w.append(sample(0)), 0);
        assert_eq!(w.append(sample(1)), 0);
        assert_eq!(w.append(sample(2)), 1);
    }

    #[test]
    fn eviction_removes_earliest_first() {
        let w = SampleWindow::new(3);
        for i in 0..5 {
            w.append(sample(i));
        }
        let snap = w.snapshot();
        let kept: Vec<Sample> = snap.samples().collect();
        assert_eq!(kept, vec![sample(2), sample(3), sample(4)]);
        assert!(snap.timestamps.windows(2).all(|p| p[0] < p[1]));
    }

    #[test]
    fn snapshot_fields_are_aligned() {
        let w = SampleWindow::new(5);
        for i in 0..8 {
            w.append(sample(i));
        }
        let snap = w.snapshot();
        assert_eq!(snap.timestamps.len(), snap.temperatures.len());
        assert_eq!(snap.temperatures.len(), snap.humidities.len());
        for (i, s) in snap.samples().enumerate() {
            assert_eq!(s.temperature(), snap.temperatures[i]);
            assert_eq!(s.humidity() - s.temperature(), 30.0);
        }
    }

    #[test]
    fn snapshot_is_a_copy() {
        let w = SampleWindow::new(5);
        w.append(sample(0));
        let snap = w.snapshot();
        w.append(sample(1));
        w.clear();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.latest(), Some(sample(0)));
    }

    #[test]
    fn tail_keeps_newest() {
        let w = SampleWindow::new(10);
        for i in 0..6 {
            w.append(sample(i));
        }
        let snap = w.snapshot();
        let t = snap.tail(2);
        assert_eq!(t.samples().collect::<Vec<_>>(), vec![sample(4), sample(5)]);
        assert_eq!(snap.tail(100).len(), 6);
        assert!(snap.tail(0).is_empty());
    }

    #[test]
    fn ranges() {
        let w = SampleWindow::new(10);
        assert!(w.snapshot().temperature_range().is_none());
        for i in 0..3 {
            w.append(sample(i));
        }
        let snap = w.snapshot();
        assert_eq!(snap.temperature_range(), Some((20.0, 22.0)));
        assert_eq!(snap.humidity_range(), Some((50.0, 52.0)));
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        use std::sync::Arc;

        let w = Arc::new(SampleWindow::new(4));
        w.append(sample(0));
        let w2 = Arc::clone(&w);
        let _ = std::thread::spawn(move || {
            let _guard = w2.samples.lock().unwrap();
            panic!("poison the window lock");
        })
        .join();
        w.append(sample(1));
        assert_eq!(w.len(), 2);
    }
}
