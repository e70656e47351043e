// Forward-only candidate fallback from a starting index; skips move on, anything else stops

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::classifier::{Classification, ErrorClassifier};
use crate::models::Candidate;
use crate::providers::ProviderError;
use crate::retry::{AttemptContext, AttemptLog, AttemptOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Evaluating(usize),
    Committed,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Commit<T> {
    pub index: usize,
    pub candidate: Candidate,
    pub value: T,
}

#[derive(Debug, Clone)]
pub struct FallbackFailure {
    pub attempts: u32,
    pub elapsed: Duration,
    /// Set when a non-skip failure stopped the walk; `None` means the list ran out.
    pub classification: Option<Classification>,
    pub last_error: Option<ProviderError>,
}

pub struct FallbackOrchestrator<'a> {
    classifier: &'a ErrorClassifier,
    state: FallbackState,
}

impl<'a> FallbackOrchestrator<'a> {
    pub fn new(classifier: &'a ErrorClassifier) -> Self {
        Self {
            classifier,
            state: FallbackState::Exhausted,
        }
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }

    pub async fn run<T, F, Fut>(
        &mut self,
        candidates: &[Candidate],
        start: usize,
        log: &mut AttemptLog,
        mut transaction: F,
    ) -> Result<Commit<T>, FallbackFailure>
    where
        F: FnMut(Candidate) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let started = Instant::now();
        let mut attempts = 0;
        let mut last_error = None;

        self.state = if start < candidates.len() {
            FallbackState::Evaluating(start)
        } else {
            FallbackState::Exhausted
        };

        while let FallbackState::Evaluating(index) = self.state {
            let candidate = &candidates[index];
            let context = AttemptContext {
                candidate_index: index,
                candidate_id: candidate.id.clone(),
                combination_id: None,
            };
            attempts += 1;

            let error = match transaction(candidate.clone()).await {
                Ok(value) => {
                    log.push(context.record(1, AttemptOutcome::Succeeded));
                    info!(
                        candidate_index = index,
                        candidate_id = %candidate.id,
                        attempts,
                        "Candidate committed"
                    );
                    self.state = FallbackState::Committed;
                    return Ok(Commit {
                        index,
                        candidate: candidate.clone(),
                        value,
                    });
                }
                Err(error) => error,
            };

            let classification = self.classifier.classify(&error);
            log.push(context.record(1, AttemptOutcome::Failed(classification)));

            if classification != Classification::Skip {
                warn!(
                    candidate_index = index,
                    candidate_id = %candidate.id,
                    %classification,
                    error = %error,
                    "Candidate failed, stopping fallback"
                );
                self.state = FallbackState::Exhausted;
                return Err(FallbackFailure {
                    attempts,
                    elapsed: started.elapsed(),
                    classification: Some(classification),
                    last_error: Some(error),
                });
            }

            info!(
                candidate_index = index,
                candidate_id = %candidate.id,
                error = %error,
                "Candidate no longer available, trying next"
            );
            last_error = Some(error);
            self.state = if index + 1 < candidates.len() {
                FallbackState::Evaluating(index + 1)
            } else {
                FallbackState::Exhausted
            };
        }

        warn!(attempts, "Candidate list exhausted");
        Err(FallbackFailure {
            attempts,
            elapsed: started.elapsed(),
            classification: None,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use parking_lot::Mutex;
    use serde_json::json;

    fn gone() -> ProviderError {
        ProviderError::with_payload("offer gone", json!({ "error": { "errorCode": 1000 } }))
    }

    fn candidates(ids: &[&str]) -> Vec<Candidate> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Candidate::flight(id, 100.0 + i as f64, 120))
            .collect()
    }

    #[tokio::test]
    async fn test_skips_until_commit() {
        let classifier = ErrorClassifier::new(&ClassifierConfig::default());
        let mut orchestrator = FallbackOrchestrator::new(&classifier);
        let mut log = AttemptLog::default();
        let tried = Mutex::new(Vec::new());

        let commit = orchestrator
            .run(&candidates(&["A", "B", "C"]), 0, &mut log, |candidate| {
                tried.lock().push(candidate.id.clone());
                async move {
                    if candidate.id == "C" {
                        Ok(format!("itinerary-{}", candidate.id))
                    } else {
                        Err(gone())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(commit.candidate.id, "C");
        assert_eq!(commit.index, 2);
        assert_eq!(commit.value, "itinerary-C");
        assert_eq!(orchestrator.state(), FallbackState::Committed);
        assert_eq!(log.count(AttemptOutcome::Failed(Classification::Skip)), 2);
        assert_eq!(*tried.lock(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_fatal_stops_without_fallback() {
        let classifier = ErrorClassifier::new(&ClassifierConfig::default());
        let mut orchestrator = FallbackOrchestrator::new(&classifier);
        let mut log = AttemptLog::default();
        let tried = Mutex::new(Vec::new());

        let failure = orchestrator
            .run(&candidates(&["A", "B"]), 0, &mut log, |candidate| {
                tried.lock().push(candidate.id.clone());
                async move {
                    if candidate.id == "A" {
                        Err::<(), _>(ProviderError::new("payment profile rejected"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.classification, Some(Classification::Fatal));
        assert_eq!(orchestrator.state(), FallbackState::Exhausted);
        assert_eq!(*tried.lock(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_walks_forward_from_start_only() {
        let classifier = ErrorClassifier::new(&ClassifierConfig::default());
        let mut orchestrator = FallbackOrchestrator::new(&classifier);
        let mut log = AttemptLog::default();
        let tried = Mutex::new(Vec::new());

        let failure = orchestrator
            .run(&candidates(&["A", "B", "C", "D"]), 2, &mut log, |candidate| {
                tried.lock().push(candidate.id.clone());
                async { Err::<(), _>(gone()) }
            })
            .await
            .unwrap_err();

        assert_eq!(*tried.lock(), vec!["C", "D"]);
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.classification, None);
        assert_eq!(failure.last_error.map(|e| e.message), Some("offer gone".to_string()));
    }

    #[tokio::test]
    async fn test_start_past_end_is_exhausted() {
        let classifier = ErrorClassifier::new(&ClassifierConfig::default());
        let mut orchestrator = FallbackOrchestrator::new(&classifier);
        let mut log = AttemptLog::default();

        let failure = orchestrator
            .run(&candidates(&["A"]), 1, &mut log, |_| async { Ok::<(), ProviderError>(()) })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 0);
        assert!(log.is_empty());
    }
}
