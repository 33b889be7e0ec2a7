use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod client;
mod config;
mod dispatcher;
mod error;
mod memory;
mod outcome;
mod report;

use aggregate::Aggregator;
use client::{CounterConnector, InMemoryConnector, RedisConnector};
use memory::MemoryDelta;
use report::{Reporter, RunInfo, RunReport};

/// Simulated round-trip for `--mock` runs
const MOCK_LATENCY: Duration = Duration::from_millis(1);

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = config::Args::parse();

    // ── 1. Logging (stderr, so stdout stays the report) ──────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level())),
        )
        .init();

    let config = args.into_config().context("invalid arguments")?;
    debug!("main start");

    // ── 2. Counter backend ───────────────────────────────────────
    let connector: Arc<dyn CounterConnector> = if config.mock {
        Arc::new(InMemoryConnector::new(MOCK_LATENCY))
    } else {
        Arc::new(
            RedisConnector::open(&config.url, config.connection)
                .await
                .with_context(|| format!("cannot reach redis at {}", config.url))?,
        )
    };
    info!(
        backend = connector.name(),
        key = %config.dispatch.key,
        requests = config.dispatch.request_num,
        concurrency = config.dispatch.concurrency,
        "starting run"
    );

    // ── 3. Ctrl-C stops admission; in-flight work still lands ───
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, draining in-flight operations");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    // ── 4. Dispatch ──────────────────────────────────────────────
    let before = memory::resident_bytes();
    let dispatch = dispatcher::run(connector, &config.dispatch, running).await;
    let mem = MemoryDelta::new(before, memory::resident_bytes());
    info!("Memory {:.3} kb", mem.delta_kb());

    // ── 5. Aggregate & report ────────────────────────────────────
    let info = RunInfo::of(&dispatch);
    let agg = Aggregator::from_outcomes(dispatch.outcomes);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if config.json {
        RunReport::new(&agg, &info, mem).write_json(&mut out)?;
    } else {
        let reporter = Reporter::new(config.show_latency);
        reporter.write_text(&agg, &mut out)?;
        if config.summary {
            reporter.write_summary(&agg, &info, &mem, &mut out)?;
        }
    }
    out.flush()?;

    if agg.has_duplicates() {
        warn!(duplicated = agg.total_duplicated(), "counter handed out duplicate values");
        if config.fail_on_duplicate {
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}
