use crate::telemetry::record::Microseconds;

/// Marker-based index into a timeline: one entry per occurrence of a named
/// point metric (default `.swf.frame` for frames, `.rend.screen` for
/// renders), recording the timeline position and time of each occurrence.
#[derive(Clone, Debug, Default)]
pub struct FrameIndex {
    positions: Vec<usize>,
    times: Vec<Microseconds>,
    start_time: Option<Microseconds>,
    end_time: Option<Microseconds>,
}

impl FrameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, position: usize, time: Microseconds) {
        self.positions.push(position);
        self.times.push(time);
    }

    /// Every record's time passes through here, marker or not, so
    /// `start_time`/`end_time` track the full session span.
    pub fn note_time(&mut self, time: Microseconds) {
        if self.start_time.is_none() {
            self.start_time = Some(time);
        }
        self.end_time = Some(time);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[Microseconds] {
        &self.times
    }

    /// Timeline position of the `k`-th marker occurrence. `k == 0` means
    /// "before the first marker" (position 0); otherwise it's the position
    /// recorded for the *previous* marker, `k - 1`; `k >= len()` means
    /// "after the last marker", returned as `None` (callers slice to the
    /// end).
    pub fn position_by_index(&self, k: usize) -> Option<usize> {
        if k == 0 {
            Some(0)
        } else if k >= self.positions.len() {
            None
        } else {
            Some(self.positions[k - 1])
        }
    }

    /// Smallest `k` such that the `k`-th marker's time is strictly greater
    /// than `t`, found by binary search over the (non-decreasing) times.
    pub fn index_by_time(&self, t: Microseconds) -> usize {
        self.times.partition_point(|&time| time <= t)
    }

    /// Convenience composition of `index_by_time` then `position_by_index`.
    pub fn position_by_time(&self, t: Microseconds) -> Option<usize> {
        self.position_by_index(self.index_by_time(t))
    }

    /// Interval ending at marker `k`: the gap since the previous marker, or
    /// since session start for `k == 0`, or until session end for
    /// `k == len()`.
    pub fn interval(&self, k: usize) -> Option<Microseconds> {
        let len = self.times.len();
        if k == 0 {
            Some(Microseconds(self.times.first()?.0.saturating_sub(self.start_time?.0)))
        } else if k < len {
            Some(Microseconds(self.times[k].0.saturating_sub(self.times[k - 1].0)))
        } else if k == len {
            Some(Microseconds(self.end_time?.0.saturating_sub(self.times.last()?.0)))
        } else {
            None
        }
    }

    fn intervals(&self) -> Vec<f64> {
        (0..=self.times.len())
            .filter_map(|k| self.interval(k))
            .map(|m| m.0 as f64)
            .collect()
    }

    /// Mean and standard deviation of inter-marker intervals, and the
    /// implied frames-per-second (`1_000_000 / mean`, since times are
    /// microseconds).
    pub fn statistics(&self) -> Option<FrameStatistics> {
        let intervals = self.intervals();
        if intervals.is_empty() {
            return None;
        }
        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let variance = intervals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();
        let fps = if mean > 0.0 { 1_000_000.0 / mean } else { 0.0 };
        Some(FrameStatistics { mean, stddev, fps })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameStatistics {
    pub mean: f64,
    pub stddev: f64,
    pub fps: f64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn s6_frame_cadence() {
        let mut idx = FrameIndex::new();
        for (pos, t) in [(0, 0u64), (1, 16_667), (2, 33_333), (3, 50_000)] {
            idx.note_time(Microseconds(t));
            idx.observe(pos, Microseconds(t));
        }
        let stats = idx.statistics().unwrap();
        assert!((stats.mean - 16_667.0).abs() < 1.0);
        assert!((stats.fps - 60.0).abs() < 0.1);
    }

    #[test]
    fn monotonicity_of_times() {
        let mut idx = FrameIndex::new();
        for t in [0u64, 10, 25, 40] {
            idx.note_time(Microseconds(t));
            idx.observe(0, Microseconds(t));
        }
        assert!(idx.times().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn index_by_time_binary_search() {
        let mut idx = FrameIndex::new();
        for t in [0u64, 100, 200, 300] {
            idx.observe(0, Microseconds(t));
        }
        assert_eq!(idx.index_by_time(Microseconds(150)), 2);
        assert_eq!(idx.index_by_time(Microseconds(300)), 4);
    }

    #[test]
    fn position_by_index_boundaries() {
        let mut idx = FrameIndex::new();
        idx.observe(5, Microseconds(10));
        idx.observe(9, Microseconds(20));
        assert_eq!(idx.position_by_index(0), Some(0));
        assert_eq!(idx.position_by_index(1), Some(5));
        assert_eq!(idx.position_by_index(2), None);
    }
}
