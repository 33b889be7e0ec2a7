pub mod in_memory;
pub mod redis_client;

use std::future::Future;
use std::pin::Pin;

use crate::error::ClientError;

pub use in_memory::InMemoryConnector;
pub use redis_client::{ConnectionMode, RedisConnector};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One worker's handle on the remote counter.
///
/// Dropping the client releases whatever connection it holds, so release
/// happens on every exit path of a worker, including failed increments.
pub trait CounterClient: Send {
    /// Atomically increment `key` and return the post-increment value.
    fn increment<'a>(&'a mut self, key: &'a str) -> BoxFuture<'a, Result<i64, ClientError>>;
}

/// Hands out counter clients to workers.
pub trait CounterConnector: Send + Sync {
    fn name(&self) -> &'static str;

    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn CounterClient>, ClientError>>;
}
