//! Poll-pass metrics collection.
//!
//! Provides a ring buffer-based histogram for tracking how long each
//! poll pass takes without heap allocations during normal operation.

use std::time::Duration;

/// Poll-loop metrics with ring buffer for pass-duration tracking.
#[derive(Debug)]
pub struct PassMetrics {
    /// Ring buffer of pass durations in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples collected (saturates at buffer size).
    sample_count: usize,
    /// Total passes executed.
    total_passes: u64,
    /// Total timer firings across all passes.
    total_fires: u64,
    /// Minimum observed pass time in nanoseconds.
    min_ns: u64,
    /// Maximum observed pass time in nanoseconds.
    max_ns: u64,
    /// Sum of all pass times for mean calculation.
    sum_ns: u64,
    /// Number of passes that exceeded the poll interval.
    overrun_count: u64,
    /// Configured poll interval in nanoseconds.
    deadline_ns: u64,
}

impl PassMetrics {
    /// Create a new metrics collector with the given histogram size.
    ///
    /// # Arguments
    ///
    /// * `histogram_size` - Number of samples to retain in the ring buffer.
    /// * `poll_interval` - Target pass period; passes exceeding it are overruns.
    #[must_use]
    pub fn new(histogram_size: usize, poll_interval: Duration) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_passes: 0,
            total_fires: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            overrun_count: 0,
            deadline_ns: poll_interval.as_nanos() as u64,
        }
    }

    /// Record a completed poll pass.
    ///
    /// Allocation-free for use in the hot loop.
    pub fn record(&mut self, duration: Duration, fires: u32) {
        let ns = duration.as_nanos() as u64;

        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_passes += 1;
        self.total_fires += u64::from(fires);
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);

        if ns > self.deadline_ns {
            self.overrun_count += 1;
        }
    }

    /// Get total number of passes executed.
    #[must_use]
    pub fn total_passes(&self) -> u64 {
        self.total_passes
    }

    /// Get total number of timer firings observed.
    #[must_use]
    pub fn total_fires(&self) -> u64 {
        self.total_fires
    }

    /// Get minimum observed pass time.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        if self.total_passes > 0 {
            Some(Duration::from_nanos(self.min_ns))
        } else {
            None
        }
    }

    /// Get maximum observed pass time.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        if self.total_passes > 0 {
            Some(Duration::from_nanos(self.max_ns))
        } else {
            None
        }
    }

    /// Get mean pass time.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.total_passes > 0 {
            Some(Duration::from_nanos(self.sum_ns / self.total_passes))
        } else {
            None
        }
    }

    /// Get number of pass overruns.
    #[must_use]
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Compute a percentile from the ring buffer.
    ///
    /// Returns `None` if no samples have been collected or if `percentile`
    /// is outside `0.0..=100.0`.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }

        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        let idx = idx.min(sorted.len() - 1);

        Some(Duration::from_nanos(sorted[idx]))
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_passes: self.total_passes,
            total_fires: self.total_fires,
            min_ns: if self.total_passes > 0 {
                Some(self.min_ns)
            } else {
                None
            },
            max_ns: if self.total_passes > 0 {
                Some(self.max_ns)
            } else {
                None
            },
            mean_ns: if self.total_passes > 0 {
                Some(self.sum_ns / self.total_passes)
            } else {
                None
            },
            overrun_count: self.overrun_count,
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_passes = 0;
        self.total_fires = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
        self.overrun_count = 0;
    }
}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total passes executed.
    pub total_passes: u64,
    /// Total timer firings observed.
    pub total_fires: u64,
    /// Minimum pass time in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum pass time in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean pass time in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Number of pass overruns.
    pub overrun_count: u64,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Get jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
