pub mod bucket;
pub mod percentiles;

use std::collections::{BTreeMap, HashSet};

pub use bucket::{LatencyStats, SecondBucket};
pub use percentiles::PercentileSet;
use percentiles::LatencyHistogram;

use crate::outcome::{Outcome, Status};

// ─── Aggregator (write side) ─────────────────────────────────────

/// Buckets outcomes by second. Owned by the caller; fed only after the
/// dispatcher's join barrier, so it needs no locking.
pub struct Aggregator {
    buckets: BTreeMap<i64, SecondBucket>,
    latency_hist: LatencyHistogram,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            latency_hist: LatencyHistogram::new(),
        }
    }

    /// Aggregate a complete run. Records are ordered by completion time
    /// first so "first sighting" of a value means the earliest one.
    pub fn from_outcomes(mut outcomes: Vec<Outcome>) -> RunAggregate {
        outcomes.sort_by_key(|o| o.completed_at);

        let mut agg = Self::new();
        for outcome in &outcomes {
            agg.add(outcome);
        }
        agg.finish()
    }

    pub fn add(&mut self, outcome: &Outcome) {
        let bucket = self.buckets.entry(outcome.second()).or_default();

        match (outcome.status, outcome.counter_value()) {
            (Status::Success, Some(value)) => {
                bucket.record_success(value, outcome.latency);
                self.latency_hist.record(outcome.latency);
            }
            // A success without a value cannot take part in duplicate checks
            (Status::Success, None) | (Status::Failed, _) => bucket.record_failure(),
        }
    }

    /// Detect duplicates across the whole run and freeze the result.
    ///
    /// Buckets are walked in ascending second order, values within a
    /// bucket in insertion order. Only repeats after the first sighting
    /// count as duplicates.
    pub fn finish(mut self) -> RunAggregate {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut duplicates: BTreeMap<i64, Vec<i64>> = BTreeMap::new();

        for (&second, bucket) in self.buckets.iter_mut() {
            bucket.duplicated = 0;
            for &value in &bucket.values {
                if !seen.insert(value) {
                    bucket.duplicated += 1;
                    duplicates.entry(value).or_default().push(second);
                }
            }
        }

        RunAggregate {
            latency: self.latency_hist.percentiles(),
            distinct_values: seen.len() as u64,
            buckets: self.buckets,
            duplicates,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RunAggregate (read side) ────────────────────────────────────

/// Finalized, read-only view of a run.
#[derive(Debug, Clone)]
pub struct RunAggregate {
    buckets: BTreeMap<i64, SecondBucket>,
    /// Duplicated value → seconds at which it recurred
    duplicates: BTreeMap<i64, Vec<i64>>,
    distinct_values: u64,
    latency: PercentileSet,
}

impl RunAggregate {
    /// Buckets in ascending second order.
    pub fn buckets(&self) -> impl Iterator<Item = (i64, &SecondBucket)> {
        self.buckets.iter().map(|(&s, b)| (s, b))
    }

    #[cfg(test)]
    pub fn bucket(&self, second: i64) -> Option<&SecondBucket> {
        self.buckets.get(&second)
    }

    /// Duplicated values in ascending order with their recurrence seconds.
    pub fn duplicates(&self) -> impl Iterator<Item = (i64, &[i64])> {
        self.duplicates.iter().map(|(&v, s)| (v, s.as_slice()))
    }

    pub fn total_success(&self) -> u64 {
        self.buckets.values().map(|b| b.success).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.buckets.values().map(|b| b.failed).sum()
    }

    pub fn total_duplicated(&self) -> u64 {
        self.buckets.values().map(|b| b.duplicated).sum()
    }

    pub fn total_records(&self) -> u64 {
        self.buckets.values().map(SecondBucket::total).sum()
    }

    pub fn distinct_values(&self) -> u64 {
        self.distinct_values
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    pub fn latency(&self) -> &PercentileSet {
        &self.latency
    }
}
