use std::time::Duration;

use chrono::{DateTime, Utc};

/// Whether an increment attempt returned a counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failed,
}

/// The result of one dispatched increment.
/// Workers create these and hand them back at the join point.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Wall-clock instant the attempt finished
    pub completed_at: DateTime<Utc>,
    pub status: Status,
    /// Post-increment counter value. Only meaningful when `status` is `Success`.
    pub value: Option<i64>,
    /// Time spent connecting and issuing the increment
    pub latency: Duration,
    /// Failure cause, for logs and the JSON report
    pub error: Option<String>,
}

impl Outcome {
    pub fn success(completed_at: DateTime<Utc>, value: i64, latency: Duration) -> Self {
        Self {
            completed_at,
            status: Status::Success,
            value: Some(value),
            latency,
            error: None,
        }
    }

    pub fn failed(
        completed_at: DateTime<Utc>,
        latency: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            completed_at,
            status: Status::Failed,
            value: None,
            latency,
            error: Some(error.into()),
        }
    }

    /// Unix second this outcome is bucketed under.
    pub fn second(&self) -> i64 {
        self.completed_at.timestamp()
    }

    /// The counter value, if this outcome is a success.
    pub fn counter_value(&self) -> Option<i64> {
        match self.status {
            Status::Success => self.value,
            Status::Failed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_second_truncates_subsecond_part() {
        let at = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        let outcome = Outcome::success(at, 1, Duration::from_millis(3));
        assert_eq!(outcome.second(), 1_700_000_000);
    }

    #[test]
    fn test_failed_outcome_never_exposes_value() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut outcome = Outcome::failed(at, Duration::ZERO, "connection refused");
        outcome.value = Some(42);

        assert_eq!(outcome.status, Status::Failed);
        assert_eq!(outcome.counter_value(), None);
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
    }
}
