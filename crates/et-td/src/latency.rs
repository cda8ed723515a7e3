//! Histogram of order acknowledgement round trips.
//!
//! A sample is the time from registering an order (just before it is handed
//! to the transport) to the dispatcher processing its response. Bins are
//! 100µs wide up to 1s; slower samples land in the last bin but still count
//! toward min/max/avg.

use std::time::Duration;

/// Width of each histogram bin in microseconds.
const BIN_WIDTH_US: u64 = 100;

/// Number of histogram bins (covers 0–1s).
const NUM_BINS: usize = 10_000;

/// Computed latency statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckLatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub avg_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
}

impl std::fmt::Display for AckLatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} min={}µs max={}µs avg={:.1}µs p50={}µs p99={}µs",
            self.count, self.min_us, self.max_us, self.avg_us, self.p50_us, self.p99_us,
        )
    }
}

/// Not thread-safe; owned by the dispatcher.
#[derive(Debug, Clone)]
pub struct AckLatency {
    bins: Vec<u64>,
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl AckLatency {
    pub fn new() -> Self {
        Self { bins: vec![0u64; NUM_BINS], count: 0, sum: 0, min: u64::MAX, max: 0 }
    }

    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.count += 1;
        self.sum = self.sum.saturating_add(us);
        self.min = self.min.min(us);
        self.max = self.max.max(us);

        let bin = ((us / BIN_WIDTH_US) as usize).min(NUM_BINS - 1);
        self.bins[bin] += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Summary statistics, or `None` before the first sample.
    pub fn stats(&self) -> Option<AckLatencyStats> {
        if self.count == 0 {
            return None;
        }
        Some(AckLatencyStats {
            count: self.count,
            min_us: self.min,
            max_us: self.max,
            avg_us: self.sum as f64 / self.count as f64,
            p50_us: self.percentile(0.50),
            p99_us: self.percentile(0.99),
        })
    }

    fn percentile(&self, pct: f64) -> u64 {
        let target = (self.count as f64 * pct).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return (i as u64) * BIN_WIDTH_US;
            }
        }
        self.max
    }
}

impl Default for AckLatency {
    fn default() -> Self {
        Self::new()
    }
}
