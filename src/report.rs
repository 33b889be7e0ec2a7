use std::io::Write;
use std::time::Duration;

use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::aggregate::{LatencyStats, PercentileSet, RunAggregate};
use crate::dispatcher::Dispatch;
use crate::error::BenchError;
use crate::memory::MemoryDelta;

/// Local-time rendering used for bucket and duplicate timestamps.
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub fn format_second(second: i64) -> String {
    match Local.timestamp_opt(second, 0).earliest() {
        Some(t) => t.format(TIME_FORMAT).to_string(),
        None => second.to_string(),
    }
}

// ─── Run metadata ────────────────────────────────────────────────

/// Dispatch facts that survive after the outcomes go to the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct RunInfo {
    pub requested: usize,
    pub dispatched: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunInfo {
    pub fn of(dispatch: &Dispatch) -> Self {
        Self {
            requested: dispatch.requested,
            dispatched: dispatch.dispatched(),
            interrupted: dispatch.interrupted,
            elapsed: dispatch.elapsed,
        }
    }

    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dispatched as f64 / secs
        } else {
            0.0
        }
    }
}

// ─── Text output ─────────────────────────────────────────────────

pub struct Reporter {
    /// Append `min ms max ms avg ms` to each per-second line
    pub show_latency: bool,
}

impl Reporter {
    pub fn new(show_latency: bool) -> Self {
        Self { show_latency }
    }

    /// Per-second lines in ascending order, then one line per duplicated value.
    pub fn write_text<W: Write>(&self, agg: &RunAggregate, out: &mut W) -> std::io::Result<()> {
        for (second, bucket) in agg.buckets() {
            write!(
                out,
                "{} {} {} {}",
                format_second(second),
                bucket.success,
                bucket.failed,
                bucket.duplicated
            )?;
            if self.show_latency {
                let l = bucket.latency();
                write!(out, " {:.2} ms {:.2} ms {:.2} ms", l.min_ms, l.max_ms, l.avg_ms)?;
            }
            writeln!(out)?;
        }

        for (value, seconds) in agg.duplicates() {
            let times: Vec<String> = seconds.iter().map(|&s| format_second(s)).collect();
            writeln!(
                out,
                "Incremented Value {} is duplicated at {}",
                value,
                times.join(",")
            )?;
        }
        Ok(())
    }

    pub fn write_summary<W: Write>(
        &self,
        agg: &RunAggregate,
        info: &RunInfo,
        memory: &MemoryDelta,
        out: &mut W,
    ) -> std::io::Result<()> {
        writeln!(out)?;
        writeln!(
            out,
            "Requests   {} dispatched / {} requested{}",
            info.dispatched,
            info.requested,
            if info.interrupted { " (interrupted)" } else { "" }
        )?;
        writeln!(
            out,
            "Outcomes   {} ok, {} failed, {} duplicated, {} distinct values",
            agg.total_success(),
            agg.total_failed(),
            agg.total_duplicated(),
            agg.distinct_values()
        )?;
        writeln!(
            out,
            "Elapsed    {:.3} s, {:.1} req/s",
            info.elapsed.as_secs_f64(),
            info.requests_per_sec()
        )?;

        let p = agg.latency();
        if p.has_data() {
            writeln!(
                out,
                "Latency    p50 {}μs  p95 {}μs  p99 {}μs  max {}μs",
                p.p50_us, p.p95_us, p.p99_us, p.max_us
            )?;
        }
        writeln!(out, "Memory     {:.3} kb", memory.delta_kb())?;
        Ok(())
    }
}

// ─── JSON output ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SecondReport {
    pub second: i64,
    pub time: String,
    pub success: u64,
    pub failed: u64,
    pub duplicated: u64,
    pub latency: LatencyStats,
}

#[derive(Debug, Serialize)]
pub struct DuplicateReport {
    pub value: i64,
    pub times: Vec<String>,
}

/// Complete machine-readable run report.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub requested: usize,
    pub dispatched: usize,
    pub interrupted: bool,
    pub elapsed_secs: f64,
    pub requests_per_sec: f64,
    pub success: u64,
    pub failed: u64,
    pub duplicated: u64,
    pub distinct_values: u64,
    pub latency_us: PercentileSet,
    pub memory: MemoryDelta,
    pub seconds: Vec<SecondReport>,
    pub duplicates: Vec<DuplicateReport>,
}

impl RunReport {
    pub fn new(agg: &RunAggregate, info: &RunInfo, memory: MemoryDelta) -> Self {
        Self {
            requested: info.requested,
            dispatched: info.dispatched,
            interrupted: info.interrupted,
            elapsed_secs: info.elapsed.as_secs_f64(),
            requests_per_sec: info.requests_per_sec(),
            success: agg.total_success(),
            failed: agg.total_failed(),
            duplicated: agg.total_duplicated(),
            distinct_values: agg.distinct_values(),
            latency_us: agg.latency().clone(),
            memory,
            seconds: agg
                .buckets()
                .map(|(second, b)| SecondReport {
                    second,
                    time: format_second(second),
                    success: b.success,
                    failed: b.failed,
                    duplicated: b.duplicated,
                    latency: b.latency(),
                })
                .collect(),
            duplicates: agg
                .duplicates()
                .map(|(value, seconds)| DuplicateReport {
                    value,
                    times: seconds.iter().map(|&s| format_second(s)).collect(),
                })
                .collect(),
        }
    }

    pub fn write_json<W: Write>(&self, out: &mut W) -> Result<(), BenchError> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }
}
