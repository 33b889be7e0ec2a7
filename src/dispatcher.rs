use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::client::CounterConnector;
use crate::outcome::Outcome;

// ─── Settings / result ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Total increments to issue
    pub request_num: usize,
    /// Maximum increments in flight at once
    pub concurrency: usize,
    /// Pacing base; each worker sleeps base + uniform[0, base) after its call
    pub sleep_base: Duration,
    /// Counter key shared by every worker
    pub key: String,
    /// Seed for reproducible pacing; `None` draws from OS entropy
    pub seed: Option<u64>,
}

/// Everything the dispatcher hands over once the join barrier is passed.
#[derive(Debug)]
pub struct Dispatch {
    /// One record per dispatched operation
    pub outcomes: Vec<Outcome>,
    pub requested: usize,
    /// True when the stop flag cut admission short
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl Dispatch {
    pub fn dispatched(&self) -> usize {
        self.outcomes.len()
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Issues `request_num` increments with at most `concurrency` in flight
/// and waits for every one of them before returning.
///
/// Clearing `running` stops further admissions. Operations already
/// admitted still finish and are recorded.
pub async fn run(
    connector: Arc<dyn CounterConnector>,
    settings: &DispatchSettings,
    running: Arc<AtomicBool>,
) -> Dispatch {
    let started = Instant::now();
    let gate = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let key: Arc<str> = Arc::from(settings.key.as_str());

    debug!(
        requests = settings.request_num,
        concurrency = settings.concurrency,
        connector = connector.name(),
        "dispatch start"
    );

    let mut handles = Vec::with_capacity(settings.request_num);
    let mut interrupted = false;

    for op_id in 0..settings.request_num {
        if !running.load(Ordering::SeqCst) {
            warn!(admitted = op_id, "stop requested, no further operations admitted");
            interrupted = true;
            break;
        }

        // Blocks here while `concurrency` operations are in flight
        let Ok(permit) = gate.clone().acquire_owned().await else {
            break;
        };

        let connector = connector.clone();
        let key = key.clone();
        let sleep_base = settings.sleep_base;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(op_id as u64)),
            None => StdRng::from_entropy(),
        };

        handles.push(tokio::spawn(async move {
            let outcome = attempt(connector.as_ref(), &key).await;
            pace(rng, sleep_base).await;
            drop(permit);
            outcome
        }));
    }

    // ── Join barrier ────────────────────────────────────────────
    let mut outcomes = Vec::with_capacity(handles.len());
    for h in handles {
        match h.await {
            Ok(outcome) => outcomes.push(outcome),
            // A worker that panicked still owes its record
            Err(e) => {
                warn!(error = %e, "worker did not complete");
                outcomes.push(Outcome::failed(
                    Utc::now(),
                    Duration::ZERO,
                    format!("worker aborted: {e}"),
                ));
            }
        }
    }

    debug!(records = outcomes.len(), "dispatch finished");

    Dispatch {
        outcomes,
        requested: settings.request_num,
        interrupted,
        elapsed: started.elapsed(),
    }
}

// ─── Single operation ────────────────────────────────────────────

async fn attempt(connector: &dyn CounterConnector, key: &str) -> Outcome {
    debug!("incr start");
    let t0 = Instant::now();

    let result = match connector.connect().await {
        Ok(mut client) => client.increment(key).await,
        Err(e) => Err(e),
    };
    // The client (if any) is dropped above, releasing its connection

    let latency = t0.elapsed();
    match result {
        Ok(value) => {
            info!("{value}");
            Outcome::success(Utc::now(), value, latency)
        }
        Err(e) => {
            warn!("error {e}");
            Outcome::failed(Utc::now(), latency, e.to_string())
        }
    }
}

/// Post-operation sleep that keeps workers from firing in lockstep.
async fn pace(mut rng: StdRng, base: Duration) {
    let delay = pacing_delay(&mut rng, base);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// `base + uniform[0, base)`, saturating at `u64::MAX` ms.
fn pacing_delay(rng: &mut StdRng, base: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rng.gen_range(0..base_ms);
    Duration::from_millis(base_ms.saturating_add(jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::client::{BoxFuture, CounterClient, InMemoryConnector};
    use crate::error::ClientError;
    use crate::outcome::Status;
    use std::sync::atomic::AtomicUsize;

    fn settings(request_num: usize, concurrency: usize) -> DispatchSettings {
        DispatchSettings {
            request_num,
            concurrency,
            sleep_base: Duration::ZERO,
            key: "test_counter".into(),
            seed: Some(7),
        }
    }

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    /// Tracks how many increments overlap.
    struct Instrumented {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        next: Arc<AtomicUsize>,
    }

    struct InstrumentedClient {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        next: Arc<AtomicUsize>,
    }

    impl CounterConnector for Instrumented {
        fn name(&self) -> &'static str {
            "instrumented"
        }

        fn connect(&self) -> BoxFuture<'_, Result<Box<dyn CounterClient>, ClientError>> {
            let client = InstrumentedClient {
                in_flight: self.in_flight.clone(),
                peak: self.peak.clone(),
                next: self.next.clone(),
            };
            Box::pin(async move { Ok(Box::new(client) as Box<dyn CounterClient>) })
        }
    }

    impl CounterClient for InstrumentedClient {
        fn increment<'a>(&'a mut self, _key: &'a str) -> BoxFuture<'a, Result<i64, ClientError>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(self.next.fetch_add(1, Ordering::SeqCst) as i64 + 1)
            })
        }
    }

    /// Always refuses to connect.
    struct Unreachable;

    impl CounterConnector for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn connect(&self) -> BoxFuture<'_, Result<Box<dyn CounterClient>, ClientError>> {
            Box::pin(async { Err(ClientError::Unavailable("connection refused".into())) })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_operation_yields_one_outcome() {
        let connector = Arc::new(InMemoryConnector::new(Duration::ZERO).failing_every(3));
        let dispatch = run(connector.clone(), &settings(30, 4), running()).await;

        assert_eq!(dispatch.dispatched(), 30);
        assert!(!dispatch.interrupted);
        let failed = dispatch
            .outcomes
            .iter()
            .filter(|o| o.status == Status::Failed)
            .count();
        assert_eq!(failed, 10);
        assert_eq!(connector.value("test_counter"), 20);
    }

    #[tokio::test]
    async fn test_zero_requests_yields_no_outcomes() {
        let connector = Arc::new(InMemoryConnector::new(Duration::ZERO));
        let dispatch = run(connector, &settings(0, 3), running()).await;
        assert_eq!(dispatch.dispatched(), 0);
        assert_eq!(dispatch.requested, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_in_flight_never_exceeds_concurrency() {
        let peak = Arc::new(AtomicUsize::new(0));
        let connector = Arc::new(Instrumented {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
            next: Arc::new(AtomicUsize::new(0)),
        });

        let dispatch = run(connector, &settings(40, 3), running()).await;

        assert_eq!(dispatch.dispatched(), 40);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_connect_failures_are_recorded_not_fatal() {
        let dispatch = run(Arc::new(Unreachable), &settings(5, 2), running()).await;

        assert_eq!(dispatch.dispatched(), 5);
        for outcome in &dispatch.outcomes {
            assert_eq!(outcome.status, Status::Failed);
            assert_eq!(outcome.counter_value(), None);
            assert!(outcome.error.as_deref().unwrap().contains("connection refused"));
        }
    }

    #[tokio::test]
    async fn test_cleared_flag_stops_admission() {
        let connector = Arc::new(InMemoryConnector::new(Duration::ZERO));
        let stopped = Arc::new(AtomicBool::new(false));

        let dispatch = run(connector, &settings(10, 2), stopped).await;

        assert!(dispatch.interrupted);
        assert_eq!(dispatch.dispatched(), 0);
        assert_eq!(dispatch.requested, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_mid_run_still_records_admitted_operations() {
        let connector = Arc::new(InMemoryConnector::new(Duration::from_millis(20)));
        let flag = running();

        let stopper = {
            let flag = flag.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(false, Ordering::SeqCst);
            })
        };

        let dispatch = run(connector.clone(), &settings(1_000, 2), flag).await;
        stopper.await.unwrap();

        assert!(dispatch.interrupted);
        assert!(dispatch.dispatched() < 1_000);
        // Every admitted increment reached the barrier
        assert_eq!(connector.value("test_counter") as usize, dispatch.dispatched());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_clients_released_after_run() {
        let connector = Arc::new(InMemoryConnector::new(Duration::from_millis(1)));
        let dispatch = run(connector.clone(), &settings(25, 5), running()).await;

        assert_eq!(dispatch.dispatched(), 25);
        assert_eq!(connector.open_clients(), 0);
    }

    #[test]
    fn test_pacing_delay_stays_within_base_and_double_base() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let delay = pacing_delay(&mut rng, Duration::from_millis(40));
            assert!(delay >= Duration::from_millis(40));
            assert!(delay < Duration::from_millis(80));
        }
        assert_eq!(pacing_delay(&mut rng, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_pacing_delay_saturates_on_huge_base() {
        let mut rng = StdRng::seed_from_u64(3);
        let huge = Duration::from_millis(u64::MAX - 1);
        let delay = pacing_delay(&mut rng, huge);
        assert!(delay >= huge);
        assert!(delay <= Duration::from_millis(u64::MAX));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispatched_outcomes_aggregate_to_request_count() {
        let connector = Arc::new(InMemoryConnector::new(Duration::ZERO).failing_every(3));
        let dispatch = run(connector, &settings(30, 4), running()).await;

        let agg = Aggregator::from_outcomes(dispatch.outcomes);

        assert_eq!(agg.total_records(), 30);
        assert_eq!(agg.total_success() + agg.total_failed(), 30);
        assert_eq!(agg.total_failed(), 10);
        assert_eq!(agg.distinct_values(), 20);
        assert!(!agg.has_duplicates());
    }

    #[tokio::test]
    async fn test_pacing_sleeps_at_least_the_base() {
        let mut s = settings(2, 2);
        s.sleep_base = Duration::from_millis(30);
        let connector = Arc::new(InMemoryConnector::new(Duration::ZERO));

        let dispatch = run(connector, &s, running()).await;

        assert_eq!(dispatch.dispatched(), 2);
        assert!(dispatch.elapsed >= Duration::from_millis(30));
    }
}
