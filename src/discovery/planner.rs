//! Query planning: turn a free-text profile into registry query URLs.

use crate::config::DiscoveryConfig;
use crate::error::BenchError;
use crate::llm::{parse_structured, CompletionService};
use crate::models::CandidateUrl;
use crate::prompts;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Number of URLs in every plan, one per search strategy.
pub const URLS_PER_PLAN: usize = 5;

/// Settings for the planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub registry_base_url: String,
    pub max_attempts: usize,
    pub backoff_base: Duration,
    pub max_query_chars: usize,
}

impl PlannerConfig {
    pub fn new(registry_base_url: &str, discovery: &DiscoveryConfig) -> Self {
        Self {
            registry_base_url: registry_base_url.to_string(),
            max_attempts: discovery.planner_attempts,
            backoff_base: discovery.backoff_base(),
            max_query_chars: discovery.max_query_chars,
        }
    }
}

/// Produces diverse registry query URLs via the completion service.
pub struct QueryPlanner {
    completion: Arc<dyn CompletionService>,
    config: PlannerConfig,
}

impl QueryPlanner {
    pub fn new(completion: Arc<dyn CompletionService>, config: PlannerConfig) -> Self {
        Self { completion, config }
    }

    /// Plan exactly [`URLS_PER_PLAN`] candidate URLs for `user_text`.
    ///
    /// Retries malformed or failed completions with exponential backoff and
    /// returns `PlanningExhausted` once every attempt has failed.
    pub async fn plan(&self, user_text: &str) -> Result<Vec<CandidateUrl>, BenchError> {
        let query: String = user_text.chars().take(self.config.max_query_chars).collect();
        let system = prompts::planner_system_prompt(&self.config.registry_base_url);
        let user = prompts::planner_user_prompt(&query);

        let mut last_error = String::from("no attempts made");

        for attempt in 0..self.config.max_attempts {
            let result = match self.completion.complete(&system, &user).await {
                Ok(content) => parse_plan(&content, &self.config.registry_base_url),
                Err(e) => Err(e),
            };

            match result {
                Ok(urls) => {
                    info!(attempt = attempt + 1, "Generated {} query URLs", urls.len());
                    return Ok(urls);
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.config.max_attempts,
                        "Query planning attempt failed: {}",
                        e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < self.config.max_attempts {
                let wait = backoff_delay(self.config.backoff_base, attempt);
                debug!("Backing off for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        error!("Maximum planning attempts reached without a valid plan");
        Err(BenchError::PlanningExhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }
}

/// Delay before the retry following `attempt` (0-based): `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Parse a planner response into candidate URLs.
///
/// The response must contain `{"urls": [...]}` with exactly
/// [`URLS_PER_PLAN`] distinct strings, each under the registry base URL.
pub fn parse_plan(content: &str, registry_base_url: &str) -> Result<Vec<CandidateUrl>, BenchError> {
    let json = parse_structured(content).ok_or_else(|| {
        BenchError::InvalidResponseFormat("planner response is not JSON".to_string())
    })?;

    let urls = json
        .get("urls")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            BenchError::InvalidResponseFormat("planner response has no 'urls' array".to_string())
        })?;

    let mut planned: Vec<CandidateUrl> = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.as_str().map(str::trim).ok_or_else(|| {
            BenchError::InvalidResponseFormat("planner returned a non-string URL".to_string())
        })?;
        if !is_under_base(url, registry_base_url) {
            return Err(BenchError::InvalidResponseFormat(format!(
                "URL outside the registry: {}",
                url
            )));
        }
        let candidate = CandidateUrl::from(url);
        if !planned.contains(&candidate) {
            planned.push(candidate);
        }
    }

    if planned.len() != URLS_PER_PLAN {
        return Err(BenchError::InvalidResponseFormat(format!(
            "expected {} distinct URLs, got {}",
            URLS_PER_PLAN,
            planned.len()
        )));
    }

    Ok(planned)
}

/// True when `url` is `base` itself or a path or query beneath it.
fn is_under_base(url: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    match url.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}
