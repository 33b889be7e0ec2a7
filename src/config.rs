use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::client::ConnectionMode;
use crate::dispatcher::DispatchSettings;
use crate::error::BenchError;

// ─── Command line ────────────────────────────────────────────────

#[derive(Parser, Debug, Clone)]
#[command(name = "redis-incr-bench")]
#[command(version)]
#[command(about = "Hammers a Redis INCR counter and checks that no value is handed out twice")]
pub struct Args {
    /// Redis host name
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Redis port
    #[arg(long, default_value_t = 6379)]
    pub port: u16,

    /// Full redis:// URL (overrides --host and --port)
    #[arg(long)]
    pub url: Option<String>,

    /// Number of concurrent in-flight increments
    #[arg(short = 'c', long = "concurrent", default_value_t = 50)]
    pub concurrency: usize,

    /// Total number of increments
    #[arg(short = 'n', long = "requests", default_value_t = 100)]
    pub request_num: usize,

    /// Pacing base in milliseconds; each worker sleeps base + rand(base)
    #[arg(short = 's', long = "sleep", default_value_t = 1000)]
    pub sleep_ms: u64,

    /// Counter key
    #[arg(short = 'k', long, default_value = "pipeline_counter")]
    pub key: String,

    /// How workers obtain their connection
    #[arg(long, value_enum, default_value_t = ConnectionMode::PerWorker)]
    pub connection: ConnectionMode,

    /// Seed for reproducible pacing
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run against an in-process counter instead of Redis
    #[arg(long)]
    pub mock: bool,

    /// Omit latency columns from the per-second lines
    #[arg(long)]
    pub no_latency: bool,

    /// Print totals, throughput and latency percentiles after the report
    #[arg(long)]
    pub summary: bool,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with status 1 when any value is duplicated
    #[arg(long)]
    pub fail_on_duplicate: bool,

    /// Verbose output; stack for more detail (-v warn, -vv info, -vvv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

// ─── Validated configuration ─────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub url: String,
    pub connection: ConnectionMode,
    pub dispatch: DispatchSettings,
    pub mock: bool,
    pub show_latency: bool,
    pub summary: bool,
    pub json: bool,
    pub fail_on_duplicate: bool,
}

impl Args {
    /// Validate the raw arguments. Any error here aborts the run before
    /// a single increment is issued.
    pub fn into_config(self) -> Result<BenchConfig, BenchError> {
        if self.concurrency == 0 {
            return Err(BenchError::Config("concurrency must be at least 1".into()));
        }
        if self.request_num == 0 {
            return Err(BenchError::Config("request count must be at least 1".into()));
        }
        if self.key.trim().is_empty() {
            return Err(BenchError::Config("counter key must not be empty".into()));
        }

        let url = match self.url {
            Some(url) => url,
            None => {
                if self.host.trim().is_empty() {
                    return Err(BenchError::Config("host must not be empty".into()));
                }
                format!("redis://{}:{}/", self.host, self.port)
            }
        };
        if !(url.starts_with("redis://") || url.starts_with("rediss://") || url.starts_with("unix://")) {
            return Err(BenchError::Config(format!(
                "unsupported url \"{url}\" (expected redis://, rediss:// or unix://)"
            )));
        }

        Ok(BenchConfig {
            url,
            connection: self.connection,
            dispatch: DispatchSettings {
                request_num: self.request_num,
                concurrency: self.concurrency,
                sleep_base: Duration::from_millis(self.sleep_ms),
                key: self.key,
                seed: self.seed,
            },
            mock: self.mock,
            show_latency: !self.no_latency,
            summary: self.summary,
            json: self.json,
            fail_on_duplicate: self.fail_on_duplicate,
        })
    }

    /// Log filter directive for the stacked `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }
}
