//! Data models for the benchmarking pipeline.
//!
//! This module contains the records flowing between pipeline stages and
//! the caller-facing result structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Path of the registry identifier inside a raw registry record.
pub const IDENTIFIER_PATH: [&str; 3] = ["protocolSection", "identificationModule", "nctId"];

/// One registry query URL produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateUrl(String);

impl CandidateUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateUrl {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Classification of a single registry fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// JSON body with a positive declared total and at least one record.
    Success,
    /// Well-formed response without usable records.
    Empty,
    /// Wrong content type or unparsable body.
    InvalidFormat,
    /// Network failure, timeout, or non-2xx status.
    TransportError,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Success => write!(f, "success"),
            FetchStatus::Empty => write!(f, "empty"),
            FetchStatus::InvalidFormat => write!(f, "invalid format"),
            FetchStatus::TransportError => write!(f, "transport error"),
        }
    }
}

/// A raw registry record. Only the identifier is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl RawRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Extract the registry identifier.
    ///
    /// A missing path, a non-string value, or a blank string yields `None`
    /// and the record is treated as absent.
    pub fn identifier(&self) -> Option<&str> {
        let mut node = &self.0;
        for key in IDENTIFIER_PATH {
            node = node.get(key)?;
        }
        node.as_str().map(str::trim).filter(|id| !id.is_empty())
    }
}

/// Result of fetching one candidate URL.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub url: CandidateUrl,
    pub status: FetchStatus,
    pub record_set: Option<Vec<RawRecord>>,
    pub declared_total: u64,
    /// Human-readable reason for a non-success classification.
    pub detail: Option<String>,
}

impl FetchOutcome {
    pub fn success(url: CandidateUrl, records: Vec<RawRecord>, declared_total: u64) -> Self {
        Self {
            url,
            status: FetchStatus::Success,
            record_set: Some(records),
            declared_total,
            detail: None,
        }
    }

    pub fn failed(url: CandidateUrl, status: FetchStatus, detail: impl Into<String>) -> Self {
        Self {
            url,
            status,
            record_set: None,
            declared_total: 0,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Number of records carried by this outcome.
    pub fn record_count(&self) -> usize {
        self.record_set.as_ref().map_or(0, Vec::len)
    }
}

/// A URL that did not contribute to the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUrl {
    pub url: CandidateUrl,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Deduplicated records from one discovery cycle plus bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct AggregatedCorpus {
    /// Unique records keyed by registry identifier (first seen wins).
    pub records: BTreeMap<String, RawRecord>,
    /// Sum of declared totals across successful sources. Overcounts overlap.
    pub raw_total: u64,
    /// URLs that contributed, in dispatch order.
    pub source_urls: Vec<CandidateUrl>,
    /// Every URL dispatched, in dispatch order.
    pub attempted_urls: Vec<CandidateUrl>,
    /// URLs whose fetch was not a success.
    pub failed_urls: Vec<FailedUrl>,
    /// Records dropped because they carried no identifier.
    pub skipped_records: usize,
}

impl AggregatedCorpus {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unique_count(&self) -> usize {
        self.records.len()
    }

    /// Build the caller-facing summary of this corpus.
    pub fn summary(&self, cycles: usize) -> CorpusSummary {
        CorpusSummary {
            attempted_urls: self.attempted_urls.clone(),
            source_urls: self.source_urls.clone(),
            failed_urls: self.failed_urls.clone(),
            unique_records: self.unique_count(),
            raw_total: self.raw_total,
            discovery_cycles: cycles,
        }
    }
}

/// A corpus record chosen for comparison, in relevance order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTrial {
    pub identifier: String,
    pub record: RawRecord,
}

/// Output of one comparison unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub identifier: String,
    /// Comparison text, or the error description when `failed`.
    pub text: String,
    pub failed: bool,
}

impl ComparisonResult {
    pub fn success(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
            failed: false,
        }
    }

    pub fn failure(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: reason.into(),
            failed: true,
        }
    }

    /// Text handed to the synthesis step for this unit.
    pub fn synthesis_input(&self) -> String {
        if self.failed {
            format!("Error generating report for {}: {}", self.identifier, self.text)
        } else {
            format!("Comparison report for {}:\n{}", self.identifier, self.text)
        }
    }
}

/// Similarity of one reference trial to the local study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    #[serde(rename = "CT_ID")]
    pub trial_id: String,
    pub percentage_similarity: f64,
}

/// Statistics section of the synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "Precision", skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(rename = "Recall", skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(rename = "F1 Score", skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(rename = "Similarity", default)]
    pub similarity: Vec<SimilarityScore>,
}

impl Statistics {
    pub fn is_empty(&self) -> bool {
        self.precision.is_none()
            && self.recall.is_none()
            && self.f1_score.is_none()
            && self.similarity.is_empty()
    }
}

/// The combined synthesis plus every per-identifier comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub narrative: String,
    pub statistics: Statistics,
    /// True when the synthesis could not be parsed or was not produced.
    pub degraded: bool,
    pub per_identifier_results: BTreeMap<String, ComparisonResult>,
}

impl FinalReport {
    pub fn structured(narrative: String, statistics: Statistics) -> Self {
        Self {
            narrative,
            statistics,
            degraded: false,
            per_identifier_results: BTreeMap::new(),
        }
    }

    pub fn degraded(narrative: String) -> Self {
        Self {
            narrative,
            statistics: Statistics::default(),
            degraded: true,
            per_identifier_results: BTreeMap::new(),
        }
    }

    /// Attach the per-identifier comparison results.
    pub fn with_results(mut self, results: BTreeMap<String, ComparisonResult>) -> Self {
        self.per_identifier_results = results;
        self
    }
}

/// Discovery bookkeeping surfaced to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub attempted_urls: Vec<CandidateUrl>,
    pub source_urls: Vec<CandidateUrl>,
    pub failed_urls: Vec<FailedUrl>,
    pub unique_records: usize,
    pub raw_total: u64,
    pub discovery_cycles: usize,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every stage ran; the report may still be degraded.
    Completed,
    /// Discovery hit its ceiling without usable records.
    NoReferenceRecords { reason: String },
}

/// Metadata about a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_date: DateTime<Utc>,
    pub model_used: String,
    pub registry_url: String,
    pub duration_seconds: f64,
}

/// The caller-facing result of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub outcome: RunOutcome,
    pub query: String,
    pub local_profile: String,
    pub discovery: CorpusSummary,
    /// Identifiers compared, in relevance order.
    pub selected_identifiers: Vec<String>,
    pub final_report: FinalReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunMetadata>,
}

impl BenchmarkResult {
    /// Comparison results in selection order.
    pub fn ordered_comparisons(&self) -> Vec<&ComparisonResult> {
        self.selected_identifiers
            .iter()
            .filter_map(|id| self.final_report.per_identifier_results.get(id))
            .collect()
    }

    pub fn failed_comparisons(&self) -> usize {
        self.final_report
            .per_identifier_results
            .values()
            .filter(|r| r.failed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_extraction() {
        let record = RawRecord::new(json!({
            "protocolSection": {"identificationModule": {"nctId": "NCT01234567"}}
        }));
        assert_eq!(record.identifier(), Some("NCT01234567"));
    }

    #[test]
    fn test_identifier_missing_path() {
        let no_module = RawRecord::new(json!({"protocolSection": {}}));
        assert_eq!(no_module.identifier(), None);

        let not_string = RawRecord::new(json!({
            "protocolSection": {"identificationModule": {"nctId": 42}}
        }));
        assert_eq!(not_string.identifier(), None);

        let blank = RawRecord::new(json!({
            "protocolSection": {"identificationModule": {"nctId": "  "}}
        }));
        assert_eq!(blank.identifier(), None);

        assert_eq!(RawRecord::new(json!([1, 2, 3])).identifier(), None);
    }

    #[test]
    fn test_comparison_synthesis_input() {
        let ok = ComparisonResult::success("NCT1", "Similar design.");
        assert_eq!(ok.synthesis_input(), "Comparison report for NCT1:\nSimilar design.");

        let failed = ComparisonResult::failure("NCT2", "timed out");
        assert!(failed.failed);
        assert_eq!(
            failed.synthesis_input(),
            "Error generating report for NCT2: timed out"
        );
    }

    #[test]
    fn test_statistics_serialization_names() {
        let stats = Statistics {
            precision: Some(0.5),
            recall: None,
            f1_score: Some(0.6),
            similarity: vec![SimilarityScore {
                trial_id: "NCT1".to_string(),
                percentage_similarity: 80.0,
            }],
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["Precision"], json!(0.5));
        assert_eq!(value["F1 Score"], json!(0.6));
        assert_eq!(value["Similarity"][0]["CT_ID"], json!("NCT1"));
        assert!(value.get("Recall").is_none());
        assert!(!stats.is_empty());
        assert!(Statistics::default().is_empty());
    }

    #[test]
    fn test_ordered_comparisons_follow_selection() {
        let mut results = BTreeMap::new();
        results.insert("A".to_string(), ComparisonResult::success("A", "a"));
        results.insert("B".to_string(), ComparisonResult::failure("B", "b"));

        let result = BenchmarkResult {
            outcome: RunOutcome::Completed,
            query: "q".to_string(),
            local_profile: "p".to_string(),
            discovery: CorpusSummary::default(),
            selected_identifiers: vec!["B".to_string(), "A".to_string()],
            final_report: FinalReport::degraded("n".to_string()).with_results(results),
            metadata: None,
        };

        let ids: Vec<_> = result
            .ordered_comparisons()
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(result.failed_comparisons(), 1);
    }
}
