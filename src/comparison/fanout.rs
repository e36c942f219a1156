//! Bounded-concurrency comparison of the local profile against each trial.

use crate::error::BenchError;
use crate::llm::CompletionService;
use crate::models::{ComparisonResult, SelectedTrial};
use crate::prompts;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs one comparison request per selected trial.
pub struct ComparisonFanOut {
    completion: Arc<dyn CompletionService>,
    max_workers: usize,
    progress: ProgressBar,
}

impl ComparisonFanOut {
    pub fn new(completion: Arc<dyn CompletionService>, max_workers: usize) -> Self {
        Self {
            completion,
            max_workers: max_workers.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report unit completion on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Compare every trial and return one result per identifier.
    ///
    /// The key set always equals the input identifier set. A failing unit
    /// yields a failed result and never affects its siblings.
    pub async fn compare_all(
        &self,
        query: &str,
        local_profile: &str,
        trials: &[SelectedTrial],
    ) -> BTreeMap<String, ComparisonResult> {
        if trials.is_empty() {
            return BTreeMap::new();
        }

        let workers = self.max_workers.min(trials.len());
        self.progress.set_length(trials.len() as u64);
        info!("Comparing {} trials with {} workers", trials.len(), workers);

        let outcomes: Vec<(String, Result<String, BenchError>)> =
            stream::iter(trials.iter().map(|trial| async move {
                let outcome = self.compare_one(query, local_profile, trial).await;
                self.progress.inc(1);
                (trial.identifier.clone(), outcome)
            }))
            .buffer_unordered(workers)
            .collect()
            .await;

        self.progress.finish_and_clear();

        outcomes
            .into_iter()
            .map(|(identifier, outcome)| {
                let result = match outcome {
                    Ok(text) => ComparisonResult::success(identifier.clone(), text),
                    Err(e) => {
                        warn!(identifier = %identifier, "Comparison failed: {}", e);
                        ComparisonResult::failure(identifier.clone(), failure_reason(e))
                    }
                };
                (identifier, result)
            })
            .collect()
    }

    async fn compare_one(
        &self,
        query: &str,
        local_profile: &str,
        trial: &SelectedTrial,
    ) -> Result<String, BenchError> {
        debug!(identifier = %trial.identifier, "Starting comparison");

        let record = serde_json::to_string_pretty(trial.record.value())
            .map_err(|e| unit_failure(&trial.identifier, e.to_string()))?;
        let prompt = prompts::comparison_prompt(query, local_profile, &trial.identifier, &record);

        let text = self
            .completion
            .complete(prompts::ANALYST_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| unit_failure(&trial.identifier, e.to_string()))?;

        if text.trim().is_empty() {
            return Err(unit_failure(&trial.identifier, "empty completion"));
        }

        debug!(identifier = %trial.identifier, chars = text.len(), "Comparison complete");
        Ok(text)
    }
}

fn unit_failure(identifier: &str, reason: impl Into<String>) -> BenchError {
    BenchError::UnitFailure {
        identifier: identifier.to_string(),
        reason: reason.into(),
    }
}

fn failure_reason(error: BenchError) -> String {
    match error {
        BenchError::UnitFailure { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;
    use crate::testing::{study, FnCompletion};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn trials(ids: &[&str]) -> Vec<SelectedTrial> {
        ids.iter()
            .map(|id| SelectedTrial {
                identifier: id.to_string(),
                record: RawRecord::new(study(id, "Reference study")),
            })
            .collect()
    }

    fn echo_identifier() -> FnCompletion {
        FnCompletion::new(|_system, user| {
            let id = user
                .split("nct_id=\"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or("?");
            Ok(format!("Comparison against {}", id))
        })
    }

    #[tokio::test]
    async fn test_completeness() {
        let ids = ["NCT3", "NCT1", "NCT2"];
        let completion = Arc::new(echo_identifier());
        let fanout = ComparisonFanOut::new(completion.clone(), 2);

        let results = fanout.compare_all("q", "profile", &trials(&ids)).await;

        let mut expected: Vec<_> = ids.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(results.keys().cloned().collect::<Vec<_>>(), expected);
        assert_eq!(results["NCT1"].text, "Comparison against NCT1");
        assert!(results.values().all(|r| !r.failed));
        assert_eq!(completion.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let completion = Arc::new(FnCompletion::new(|_system, user| {
            if user.contains("nct_id=\"NCT2\"") {
                Err(BenchError::Transport("connection reset".to_string()))
            } else {
                Ok("fine".to_string())
            }
        }));
        let fanout = ComparisonFanOut::new(completion, 5);

        let results = fanout
            .compare_all("q", "profile", &trials(&["NCT1", "NCT2", "NCT3", "NCT4"]))
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results.values().filter(|r| r.failed).count(), 1);
        assert!(results["NCT2"].failed);
        assert!(results["NCT2"].text.contains("connection reset"));
        assert_eq!(results["NCT1"].text, "fine");
    }

    #[tokio::test]
    async fn test_empty_reply_is_failure() {
        let completion = Arc::new(FnCompletion::new(|_, _| Ok("   ".to_string())));
        let fanout = ComparisonFanOut::new(completion, 1);

        let results = fanout.compare_all("q", "p", &trials(&["NCT1"])).await;
        assert!(results["NCT1"].failed);
        assert_eq!(results["NCT1"].text, "empty completion");
    }

    #[tokio::test]
    async fn test_no_trials() {
        let completion = Arc::new(echo_identifier());
        let fanout = ComparisonFanOut::new(completion.clone(), 5);
        assert!(fanout.compare_all("q", "p", &[]).await.is_empty());
        assert_eq!(completion.calls(), 0);
    }

    struct GaugedCompletion {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for GaugedCompletion {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, BenchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("done".to_string())
        }

        fn model_name(&self) -> &str {
            "gauged"
        }
    }

    #[tokio::test]
    async fn test_worker_bound() {
        let completion = Arc::new(GaugedCompletion {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let fanout = ComparisonFanOut::new(completion.clone(), 2);

        let results = fanout
            .compare_all("q", "p", &trials(&["A", "B", "C", "D", "E"]))
            .await;

        assert_eq!(results.len(), 5);
        assert_eq!(completion.peak.load(Ordering::SeqCst), 2);
    }
}
