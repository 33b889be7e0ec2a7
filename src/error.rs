use thiserror::Error;

// ─── Per-operation errors ────────────────────────────────────────

/// Why a single increment attempt failed.
///
/// These never escape a worker: the dispatcher folds them into a
/// `Failed` outcome and the run carries on.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("counter unavailable: {0}")]
    Unavailable(String),
}

// ─── Harness-level errors ────────────────────────────────────────

/// Fatal errors raised before dispatch starts or while writing the report.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
