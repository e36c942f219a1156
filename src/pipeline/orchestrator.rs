//! The benchmarking state machine.
//!
//! Drives discovery (plan then aggregate, retried up to a fixed number of
//! cycles), selection, the comparison fan-out, and the final reduction.
//! Every stage finishes before the next begins.

use crate::comparison::{ComparisonFanOut, ReportReducer};
use crate::config::Config;
use crate::discovery::{select, Aggregator, PlannerConfig, QueryPlanner};
use crate::error::BenchError;
use crate::llm::CompletionService;
use crate::models::{
    AggregatedCorpus, BenchmarkResult, FinalReport, RunMetadata, RunOutcome, SelectedTrial,
};
use crate::ranking::RelevanceRanker;
use crate::registry::RegistrySource;
use chrono::Utc;
use indicatif::ProgressBar;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::error::Elapsed;
use tracing::{debug, error, info, warn};

/// Pipeline-level limits.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Plan+aggregate cycles before discovery gives up.
    pub max_discovery_cycles: usize,
    /// Cap on trials handed to the comparison fan-out.
    pub max_trials: usize,
    /// Registry base URL, recorded in run metadata.
    pub registry_url: String,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_discovery_cycles: config.discovery.max_cycles,
            max_trials: config.comparison.max_trials,
            registry_url: config.registry.base_url.clone(),
        }
    }
}

/// Orchestrator states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Planning { cycle: usize },
    Aggregating { cycle: usize },
    Selecting,
    Comparing,
    Reducing,
    Done,
    Failed(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Planning { cycle } => write!(f, "planning (cycle {})", cycle),
            Stage::Aggregating { cycle } => write!(f, "aggregating (cycle {})", cycle),
            Stage::Selecting => write!(f, "selecting"),
            Stage::Comparing => write!(f, "comparing"),
            Stage::Reducing => write!(f, "reducing"),
            Stage::Done => write!(f, "done"),
            Stage::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Current stage plus every stage entered so far.
#[derive(Debug)]
pub struct StageMachine {
    current: Stage,
    history: Vec<Stage>,
}

impl StageMachine {
    pub fn new() -> Self {
        Self {
            current: Stage::Idle,
            history: vec![Stage::Idle],
        }
    }

    pub fn advance(&mut self, next: Stage) {
        debug!("Stage: {} -> {}", self.current, next);
        self.history.push(next.clone());
        self.current = next;
    }

    pub fn current(&self) -> &Stage {
        &self.current
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of the discovery phase.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Corpus of the last cycle run.
    pub corpus: AggregatedCorpus,
    /// Cycles consumed.
    pub cycles: usize,
    /// Why the last unsuccessful cycle failed.
    pub last_failure: Option<String>,
}

impl Discovery {
    pub fn found_records(&self) -> bool {
        !self.corpus.is_empty()
    }
}

/// Drives one benchmarking run over the injected collaborators.
pub struct Orchestrator {
    planner: QueryPlanner,
    aggregator: Aggregator,
    ranker: Arc<dyn RelevanceRanker>,
    fanout: ComparisonFanOut,
    reducer: ReportReducer,
    model_name: String,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        completion: Arc<dyn CompletionService>,
        registry: Arc<dyn RegistrySource>,
        ranker: Arc<dyn RelevanceRanker>,
    ) -> Self {
        let planner = QueryPlanner::new(
            Arc::clone(&completion),
            PlannerConfig::new(&config.registry.base_url, &config.discovery),
        );

        Self {
            planner,
            aggregator: Aggregator::new(registry, config.registry.concurrency),
            ranker,
            fanout: ComparisonFanOut::new(Arc::clone(&completion), config.comparison.concurrency),
            reducer: ReportReducer::new(Arc::clone(&completion)),
            model_name: completion.model_name().to_string(),
            config: PipelineConfig::from_config(config),
        }
    }

    /// Track comparison progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.fanout = self.fanout.with_progress(progress);
        self
    }

    /// Run the whole pipeline.
    ///
    /// Never fails: an exhausted discovery ceiling yields a
    /// [`RunOutcome::NoReferenceRecords`] result with a degraded report.
    pub async fn run(&self, query: &str, local_profile: &str) -> BenchmarkResult {
        let mut machine = StageMachine::new();
        let result = self.run_with(&mut machine, query, local_profile).await;
        debug!(
            transitions = machine.history().len(),
            "Run finished in stage {}",
            machine.current()
        );
        result
    }

    /// Run the pipeline under a caller-level deadline.
    ///
    /// On expiry every in-flight request is dropped and no partial result
    /// is returned.
    pub async fn run_with_deadline(
        &self,
        query: &str,
        local_profile: &str,
        limit: Duration,
    ) -> Result<BenchmarkResult, Elapsed> {
        tokio::time::timeout(limit, self.run(query, local_profile)).await
    }

    /// Plan and aggregate until records are found or the cycle ceiling is hit.
    pub async fn discover(&self, local_profile: &str) -> Discovery {
        let mut machine = StageMachine::new();
        self.discover_with(&mut machine, local_profile).await
    }

    pub(crate) async fn run_with(
        &self,
        machine: &mut StageMachine,
        query: &str,
        local_profile: &str,
    ) -> BenchmarkResult {
        let started = Instant::now();
        let run_date = Utc::now();

        let discovery = self.discover_with(machine, local_profile).await;
        let summary = discovery.corpus.summary(discovery.cycles);

        let (outcome, selected_identifiers, final_report) = if discovery.found_records() {
            machine.advance(Stage::Selecting);
            let selected = self.select_trials(local_profile, &discovery.corpus).await;
            let identifiers: Vec<String> =
                selected.iter().map(|t| t.identifier.clone()).collect();
            info!("Selected {} trials: {}", identifiers.len(), identifiers.join(", "));

            machine.advance(Stage::Comparing);
            let results = self.fanout.compare_all(query, local_profile, &selected).await;

            machine.advance(Stage::Reducing);
            let texts: Vec<String> = identifiers
                .iter()
                .filter_map(|id| results.get(id))
                .map(|r| r.synthesis_input())
                .collect();
            let report = self
                .reducer
                .reduce(local_profile, query, &texts)
                .await
                .with_results(results);

            machine.advance(Stage::Done);
            (RunOutcome::Completed, identifiers, report)
        } else {
            let reason = format!(
                "no reference records after {} discovery cycles{}",
                discovery.cycles,
                discovery
                    .last_failure
                    .as_deref()
                    .map(|f| format!(" ({})", f))
                    .unwrap_or_default()
            );
            error!("{}", reason);
            machine.advance(Stage::Failed(reason.clone()));

            let report = FinalReport::degraded(format!(
                "No clinical trials found after {} discovery attempts.",
                discovery.cycles
            ));
            (RunOutcome::NoReferenceRecords { reason }, Vec::new(), report)
        };

        BenchmarkResult {
            outcome,
            query: query.to_string(),
            local_profile: local_profile.to_string(),
            discovery: summary,
            selected_identifiers,
            final_report,
            metadata: Some(RunMetadata {
                run_date,
                model_used: self.model_name.clone(),
                registry_url: self.config.registry_url.clone(),
                duration_seconds: started.elapsed().as_secs_f64(),
            }),
        }
    }

    async fn discover_with(&self, machine: &mut StageMachine, local_profile: &str) -> Discovery {
        let mut discovery = Discovery::default();

        for cycle in 1..=self.config.max_discovery_cycles {
            discovery.cycles = cycle;

            machine.advance(Stage::Planning { cycle });
            let urls = match self.planner.plan(local_profile).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(cycle, "Discovery cycle failed during planning: {}", e);
                    discovery.last_failure = Some(e.to_string());
                    discovery.corpus = AggregatedCorpus::default();
                    continue;
                }
            };

            machine.advance(Stage::Aggregating { cycle });
            discovery.corpus = self.aggregator.aggregate(&urls).await;

            if discovery.found_records() {
                info!(
                    cycle,
                    "Discovery found {} unique records",
                    discovery.corpus.unique_count()
                );
                discovery.last_failure = None;
                return discovery;
            }

            warn!(cycle, "Discovery cycle produced no records");
            discovery.last_failure = Some(
                BenchError::EmptyResult("no candidate URL returned records".to_string()).to_string(),
            );
        }

        discovery
    }

    async fn select_trials(&self, local_profile: &str, corpus: &AggregatedCorpus) -> Vec<SelectedTrial> {
        let ranked = self.ranker.rank(local_profile, corpus).await;
        let mut selected = select(corpus, &ranked);

        if selected.is_empty() {
            warn!("Ranking matched none of the {} corpus records", corpus.unique_count());
        }

        selected.truncate(self.config.max_trials);
        selected
    }
}
