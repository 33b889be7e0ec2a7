use redis::aio::{ConnectionLike, ConnectionManager};
use tracing::debug;

use super::{BoxFuture, CounterClient, CounterConnector};
use crate::error::{BenchError, ClientError};

/// How workers get their Redis connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConnectionMode {
    /// Every operation opens (and drops) its own multiplexed connection.
    PerWorker,
    /// All operations share one auto-reconnecting `ConnectionManager`.
    Shared,
}

/// Connector backed by a real Redis server.
pub struct RedisConnector {
    client: redis::Client,
    shared: Option<ConnectionManager>,
}

impl RedisConnector {
    /// Parses the URL and, in `Shared` mode, establishes the single
    /// connection up front so an unreachable server aborts the run
    /// before any operation is issued.
    pub async fn open(url: &str, mode: ConnectionMode) -> Result<Self, BenchError> {
        let client = redis::Client::open(url)?;

        let shared = match mode {
            ConnectionMode::PerWorker => None,
            ConnectionMode::Shared => {
                let manager = ConnectionManager::new(client.clone()).await?;
                debug!(url, "shared redis connection established");
                Some(manager)
            }
        };

        Ok(Self { client, shared })
    }
}

impl CounterConnector for RedisConnector {
    fn name(&self) -> &'static str {
        match self.shared {
            Some(_) => "redis (shared)",
            None => "redis (per-worker)",
        }
    }

    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn CounterClient>, ClientError>> {
        Box::pin(async move {
            if let Some(manager) = &self.shared {
                // Clones share the underlying multiplexed TCP connection
                return Ok(Box::new(RedisCounter { conn: manager.clone() }) as Box<dyn CounterClient>);
            }

            let conn = self.client.get_multiplexed_async_connection().await?;
            Ok(Box::new(RedisCounter { conn }) as Box<dyn CounterClient>)
        })
    }
}

/// `INCR` over any async Redis connection.
struct RedisCounter<C> {
    conn: C,
}

impl<C> CounterClient for RedisCounter<C>
where
    C: ConnectionLike + Send,
{
    fn increment<'a>(&'a mut self, key: &'a str) -> BoxFuture<'a, Result<i64, ClientError>> {
        Box::pin(async move {
            let mut cmd = redis::cmd("INCR");
            cmd.arg(key);
            let value: i64 = cmd.query_async(&mut self.conn).await?;
            Ok(value)
        })
    }
}
