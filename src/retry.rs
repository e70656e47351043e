// Bounded retry scopes: per-combination attempt counters under a hotel-wide deadline

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::classifier::{Classification, ErrorClassifier};
use crate::config::RetryBudget;
use crate::providers::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(Classification),
}

/// One provider attempt, kept for the lifetime of a single booking request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub candidate_index: usize,
    pub candidate_id: String,
    pub combination_id: Option<String>,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

// Identifies what an attempt was made against
#[derive(Debug, Clone, Default)]
pub struct AttemptContext {
    pub candidate_index: usize,
    pub candidate_id: String,
    pub combination_id: Option<String>,
}

impl AttemptContext {
    pub fn record(&self, attempt: u32, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            candidate_index: self.candidate_index,
            candidate_id: self.candidate_id.clone(),
            combination_id: self.combination_id.clone(),
            attempt,
            outcome,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttemptLog {
    records: Vec<AttemptRecord>,
}

impl AttemptLog {
    pub fn push(&mut self, record: AttemptRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn count(&self, outcome: AttemptOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn into_records(self) -> Vec<AttemptRecord> {
        self.records
    }
}

/// Optional wall-clock bound measured from when the scope started.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn unbounded() -> Self {
        Self::start(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.limit.map_or(false, |limit| self.elapsed() >= limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    DeadlineExceeded,
    /// The failure was not worth retrying on the same target.
    Aborted(Classification),
}

#[derive(Debug, Clone)]
pub struct ScopeFailure {
    pub reason: StopReason,
    pub attempts: u32,
    pub last_error: Option<ProviderError>,
}

pub struct RetryScope<'a> {
    budget: RetryBudget,
    deadline: &'a Deadline,
    classifier: &'a ErrorClassifier,
    attempts: u32,
}

impl<'a> RetryScope<'a> {
    pub fn new(budget: RetryBudget, deadline: &'a Deadline, classifier: &'a ErrorClassifier) -> Self {
        Self {
            budget,
            deadline,
            classifier,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs `step` until it succeeds or the scope gives up.
    ///
    /// Only `RetrySame` failures are retried, after a fixed delay. The
    /// deadline is checked before every attempt and before every delay.
    pub async fn run<T, F, Fut>(
        &mut self,
        context: &AttemptContext,
        log: &mut AttemptLog,
        mut step: F,
    ) -> Result<T, ScopeFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        loop {
            if self.attempts >= self.budget.max_attempts {
                return Err(self.stop(StopReason::BudgetExhausted, last_error));
            }
            if self.deadline.is_expired() {
                return Err(self.stop(StopReason::DeadlineExceeded, last_error));
            }

            self.attempts += 1;

            let error = match step().await {
                Ok(value) => {
                    log.push(context.record(self.attempts, AttemptOutcome::Succeeded));
                    return Ok(value);
                }
                Err(error) => error,
            };

            let classification = self.classifier.classify(&error);
            log.push(context.record(self.attempts, AttemptOutcome::Failed(classification)));
            warn!(
                candidate_id = %context.candidate_id,
                combination_id = ?context.combination_id,
                attempt = self.attempts,
                max_attempts = self.budget.max_attempts,
                %classification,
                error = %error,
                "Attempt failed"
            );

            if classification != Classification::RetrySame {
                return Err(self.stop(StopReason::Aborted(classification), Some(error)));
            }
            last_error = Some(error);

            if self.attempts >= self.budget.max_attempts {
                return Err(self.stop(StopReason::BudgetExhausted, last_error));
            }
            if self.deadline.is_expired() {
                return Err(self.stop(StopReason::DeadlineExceeded, last_error));
            }

            debug!(
                delay_ms = self.budget.inter_attempt_delay_ms,
                elapsed_ms = self.deadline.elapsed().as_millis() as u64,
                "Waiting before retry"
            );
            sleep(self.budget.inter_attempt_delay()).await;
        }
    }

    fn stop(&self, reason: StopReason, last_error: Option<ProviderError>) -> ScopeFailure {
        ScopeFailure {
            reason,
            attempts: self.attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new(&ClassifierConfig::default())
    }

    fn sold_out() -> ProviderError {
        ProviderError::with_payload(
            "rate selection failed",
            json!({ "details": { "error": { "errors": ["Sold out"] } } }),
        )
    }

    fn context() -> AttemptContext {
        AttemptContext {
            candidate_index: 0,
            candidate_id: "hotel-1".to_string(),
            combination_id: Some("rec-1".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_errors_use_full_budget_with_delays() {
        let classifier = classifier();
        let deadline = Deadline::unbounded();
        let mut scope = RetryScope::new(RetryBudget::default(), &deadline, &classifier);
        let mut log = AttemptLog::default();
        let calls = AtomicU32::new(0);

        let started = Instant::now();
        let result: Result<(), _> = scope
            .run(&context(), &mut log, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(sold_out()) }
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.reason, StopReason::BudgetExhausted);
        assert_eq!(failure.attempts, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(log.count(AttemptOutcome::Failed(Classification::RetrySame)), 5);
        // four delays between five attempts
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4000), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(5000), "elapsed {elapsed:?}");
        assert!(failure.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_availability_error_aborts_after_one_attempt() {
        let classifier = classifier();
        let deadline = Deadline::unbounded();
        let mut scope = RetryScope::new(RetryBudget::default(), &deadline, &classifier);
        let mut log = AttemptLog::default();

        let started = Instant::now();
        let result: Result<(), _> = scope
            .run(&context(), &mut log, || async {
                Err(ProviderError::new("Invalid traveler details"))
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.reason, StopReason::Aborted(Classification::Fatal));
        assert_eq!(failure.attempts, 1);
        assert_eq!(log.len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let classifier = classifier();
        let deadline = Deadline::unbounded();
        let mut scope = RetryScope::new(RetryBudget::default(), &deadline, &classifier);
        let mut log = AttemptLog::default();
        let calls = AtomicU32::new(0);

        let result = scope
            .run(&context(), &mut log, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(sold_out())
                    } else {
                        Ok("confirmed")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "confirmed");
        assert_eq!(scope.attempts(), 3);
        assert_eq!(log.count(AttemptOutcome::Succeeded), 1);
        assert_eq!(log.records().last().map(|r| r.attempt), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_before_budget() {
        let classifier = classifier();
        let budget = RetryBudget {
            max_attempts: 10,
            inter_attempt_delay_ms: 1000,
            deadline_ms: Some(2500),
        };
        let deadline = Deadline::start(budget.deadline());
        let mut scope = RetryScope::new(budget, &deadline, &classifier);
        let mut log = AttemptLog::default();

        let result: Result<(), _> = scope
            .run(&context(), &mut log, || async { Err(sold_out()) })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.reason, StopReason::DeadlineExceeded);
        // attempts at 0s, 1s and 2s; expired by the time the 3s attempt would start
        assert_eq!(failure.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_makes_no_attempt() {
        let classifier = classifier();
        let deadline = Deadline::start(Some(Duration::from_millis(100)));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut scope = RetryScope::new(RetryBudget::default(), &deadline, &classifier);
        let mut log = AttemptLog::default();
        let result: Result<(), _> = scope
            .run(&context(), &mut log, || async { Ok(()) })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.reason, StopReason::DeadlineExceeded);
        assert_eq!(failure.attempts, 0);
        assert!(failure.last_error.is_none());
        assert!(log.is_empty());
    }
}
