use std::time::Duration;

use serde::Serialize;

/// Everything observed during one wall-clock second.
#[derive(Debug, Clone, Default)]
pub struct SecondBucket {
    pub success: u64,
    pub failed: u64,
    /// Repeats of already-seen values, filled in when aggregation finishes
    pub duplicated: u64,
    /// Successful counter values in completion order
    pub values: Vec<i64>,
    /// Successful latencies in completion order
    pub latencies: Vec<Duration>,
}

impl SecondBucket {
    pub fn record_success(&mut self, value: i64, latency: Duration) {
        self.success += 1;
        self.values.push(value);
        self.latencies.push(latency);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn total(&self) -> u64 {
        self.success + self.failed
    }

    pub fn latency(&self) -> LatencyStats {
        LatencyStats::from_samples(&self.latencies)
    }
}

/// Min / max / average of a bucket's successful latencies, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

impl LatencyStats {
    /// All zero when there are no samples.
    pub fn from_samples(samples: &[Duration]) -> Self {
        let Some(&first) = samples.first() else {
            return Self::default();
        };

        let (mut min, mut max, mut sum) = (first, first, Duration::ZERO);
        for &d in samples {
            min = min.min(d);
            max = max.max(d);
            sum += d;
        }

        Self {
            min_ms: as_ms(min),
            max_ms: as_ms(max),
            avg_ms: as_ms(sum) / samples.len() as f64,
        }
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}
