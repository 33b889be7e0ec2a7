use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;

use super::{BoxFuture, CounterClient, CounterConnector};
use crate::error::ClientError;

/// In-process counter used for `--mock` runs and tests.
///
/// Increments are atomic under a single mutex, so a correct run never
/// reports duplicates against it.
pub struct InMemoryConnector {
    state: Arc<Shared>,
    delay: Duration,
    fail_every: Option<u64>,
}

struct Shared {
    counters: Mutex<HashMap<String, i64>>,
    calls: AtomicU64,
    open_clients: AtomicUsize,
}

impl InMemoryConnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: Arc::new(Shared {
                counters: Mutex::new(HashMap::new()),
                calls: AtomicU64::new(0),
                open_clients: AtomicUsize::new(0),
            }),
            delay,
            fail_every: None,
        }
    }

    /// Make every `n`th increment fail without touching the counter.
    #[cfg(test)]
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Current value of `key` (0 if never incremented).
    #[cfg(test)]
    pub fn value(&self, key: &str) -> i64 {
        self.state.counters.lock().get(key).copied().unwrap_or(0)
    }

    /// Clients handed out and not yet dropped.
    #[cfg(test)]
    pub fn open_clients(&self) -> usize {
        self.state.open_clients.load(Ordering::SeqCst)
    }
}

impl CounterConnector for InMemoryConnector {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn CounterClient>, ClientError>> {
        self.state.open_clients.fetch_add(1, Ordering::SeqCst);
        let client = InMemoryClient {
            state: self.state.clone(),
            delay: self.delay,
            fail_every: self.fail_every,
        };
        Box::pin(async move { Ok(Box::new(client) as Box<dyn CounterClient>) })
    }
}

struct InMemoryClient {
    state: Arc<Shared>,
    delay: Duration,
    fail_every: Option<u64>,
}

impl CounterClient for InMemoryClient {
    fn increment<'a>(&'a mut self, key: &'a str) -> BoxFuture<'a, Result<i64, ClientError>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }

            let call = self.state.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(n) = self.fail_every {
                if call % n == 0 {
                    return Err(ClientError::Unavailable(format!("injected failure on call {call}")));
                }
            }

            let mut counters = self.state.counters.lock();
            let value = counters.entry(key.to_owned()).or_insert(0);
            *value += 1;
            Ok(*value)
        })
    }
}

impl Drop for InMemoryClient {
    fn drop(&mut self) {
        self.state.open_clients.fetch_sub(1, Ordering::SeqCst);
    }
}
