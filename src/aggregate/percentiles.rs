use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// Run-wide histogram of successful increment latencies.
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
        }
    }

    /// Record one latency, clamped into the tracked 1 μs..60 s range.
    pub fn record(&mut self, latency: Duration) {
        let us = (latency.as_micros() as u64).clamp(HIST_LOW, HIST_HIGH);
        let _ = self.hist.record(us);
    }

    /// Summarize everything recorded so far; all zero when empty.
    pub fn percentiles(&self) -> PercentileSet {
        let h = &self.hist;
        if h.is_empty() {
            return PercentileSet::default();
        }

        let at = |q: f64| h.value_at_quantile(q);
        PercentileSet {
            count: h.len(),
            mean_us: h.mean(),
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: h.max(),
        }
    }
}

/// Run-wide latency summary in microseconds, as printed by the summary
/// block and serialized into the JSON report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileSet {
    pub count: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl PercentileSet {
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
