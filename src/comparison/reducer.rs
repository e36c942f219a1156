//! Fan-in: synthesize all comparison texts into one final report.

use crate::error::BenchError;
use crate::llm::{parse_structured, CompletionService};
use crate::models::{FinalReport, SimilarityScore, Statistics};
use crate::prompts;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Issues the single synthesis request over the ordered comparisons.
pub struct ReportReducer {
    completion: Arc<dyn CompletionService>,
}

impl ReportReducer {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Reduce the comparison texts into a [`FinalReport`].
    ///
    /// Never fails: an unusable synthesis yields a degraded report.
    pub async fn reduce(
        &self,
        local_profile: &str,
        user_text: &str,
        comparison_texts: &[String],
    ) -> FinalReport {
        let prompt = prompts::synthesis_prompt(user_text, local_profile, comparison_texts);

        match self
            .completion
            .complete(prompts::ANALYST_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(raw) => match parse_synthesis(&raw) {
                Ok(report) => {
                    info!(
                        similarity_entries = report.statistics.similarity.len(),
                        "Synthesis parsed"
                    );
                    report
                }
                Err(e) => {
                    warn!("{}", e);
                    FinalReport::degraded(raw)
                }
            },
            Err(e) => {
                warn!("Synthesis request failed: {}", e);
                FinalReport::degraded(format!(
                    "Synthesis unavailable ({}).\n\n{}",
                    e,
                    comparison_texts.join("\n\n---\n\n")
                ))
            }
        }
    }
}

/// Parse a synthesis reply into a structured report.
pub fn parse_synthesis(raw: &str) -> Result<FinalReport, BenchError> {
    let json = parse_structured(raw)
        .ok_or_else(|| BenchError::SynthesisDegraded("reply is not JSON".to_string()))?;

    let narrative = json
        .get("Response")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BenchError::SynthesisDegraded("reply has no 'Response' text".to_string()))?;

    let statistics = json
        .get("Statistics")
        .map(parse_statistics)
        .unwrap_or_default();

    Ok(FinalReport::structured(narrative.to_string(), statistics))
}

/// Lenient statistics parsing; numbers may arrive as strings, bad entries are dropped.
fn parse_statistics(value: &Value) -> Statistics {
    let similarity = value
        .get("Similarity")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let trial_id = entry.get("CT_ID")?.as_str()?.trim();
                    if trial_id.is_empty() {
                        return None;
                    }
                    Some(SimilarityScore {
                        trial_id: trial_id.to_string(),
                        percentage_similarity: number(entry.get("percentage_similarity")?)?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Statistics {
        precision: value.get("Precision").and_then(number),
        recall: value.get("Recall").and_then(number),
        f1_score: value.get("F1 Score").and_then(number),
        similarity,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCompletion;
    use serde_json::json;

    #[tokio::test]
    async fn test_structured_synthesis() {
        let reply = json!({
            "Response": "## Summary\nThe local study resembles NCT1.",
            "Statistics": {
                "Precision": 0.8,
                "Recall": "0.6",
                "F1 Score": 0.69,
                "Similarity": [
                    {"CT_ID": "NCT1", "percentage_similarity": 85},
                    {"CT_ID": "NCT2", "percentage_similarity": "40%"},
                    {"CT_ID": "", "percentage_similarity": 10},
                    {"percentage_similarity": 5}
                ]
            }
        })
        .to_string();
        let completion = Arc::new(ScriptedCompletion::new(vec![Ok(reply)]));
        let reducer = ReportReducer::new(completion.clone());

        let report = reducer
            .reduce("profile", "question", &["Comparison report for NCT1:\nx".to_string()])
            .await;

        assert!(!report.degraded);
        assert_eq!(report.narrative, "## Summary\nThe local study resembles NCT1.");
        assert_eq!(report.statistics.precision, Some(0.8));
        assert_eq!(report.statistics.recall, Some(0.6));
        assert_eq!(report.statistics.similarity.len(), 2);
        assert_eq!(report.statistics.similarity[1].percentage_similarity, 40.0);
        assert!(completion.user_prompts()[0].contains("Comparison report for NCT1:\nx"));
    }

    #[tokio::test]
    async fn test_unparsable_synthesis_falls_back() {
        let raw = "The trials broadly agree, but I cannot produce JSON.";
        let completion = Arc::new(ScriptedCompletion::new(vec![Ok(raw.to_string())]));
        let reducer = ReportReducer::new(completion);

        let report = reducer.reduce("profile", "question", &[]).await;

        assert!(report.degraded);
        assert_eq!(report.narrative, raw);
        assert!(report.statistics.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_comparisons() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Err(BenchError::Transport(
            "timed out".to_string(),
        ))]));
        let reducer = ReportReducer::new(completion);
        let texts = vec!["first".to_string(), "second".to_string()];

        let report = reducer.reduce("profile", "question", &texts).await;

        assert!(report.degraded);
        assert!(report.narrative.contains("timed out"));
        assert!(report.narrative.contains("first\n\n---\n\nsecond"));
    }

    #[test]
    fn test_missing_response_is_degraded() {
        let err = parse_synthesis(r#"{"Statistics": {"Precision": 1.0}}"#).unwrap_err();
        assert!(matches!(err, BenchError::SynthesisDegraded(_)));
    }

    #[test]
    fn test_fenced_reply_without_statistics() {
        let report = parse_synthesis("```json\n{\"Response\": \"ok\"}\n```").unwrap();
        assert_eq!(report.narrative, "ok");
        assert!(report.statistics.is_empty());
    }
}
