//! HTTP registry client and response classification.

use crate::config::RegistryConfig;
use crate::error::BenchError;
use crate::models::{CandidateUrl, FetchOutcome, FetchStatus, RawRecord};
use crate::registry::RegistrySource;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Registry client issuing one bounded-timeout GET per URL, without retries.
pub struct RegistryClient {
    http_client: reqwest::Client,
}

impl RegistryClient {
    /// Create a client with the configured request timeout.
    pub fn new(config: &RegistryConfig) -> Result<Self, BenchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("trialbench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BenchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    async fn get(&self, url: &CandidateUrl) -> Result<(Option<String>, Vec<u8>), BenchError> {
        let response = self.http_client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BenchError::Transport(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok((content_type, body.to_vec()))
    }
}

#[async_trait]
impl RegistrySource for RegistryClient {
    async fn fetch(&self, url: &CandidateUrl) -> FetchOutcome {
        debug!(url = %url, "Fetching registry URL");

        let outcome = match self.get(url).await {
            Ok((content_type, body)) => classify_response(url, content_type.as_deref(), &body),
            Err(e) => FetchOutcome::failed(url.clone(), FetchStatus::TransportError, e.to_string()),
        };

        match outcome.status {
            FetchStatus::Success => info!(
                url = %url,
                declared_total = outcome.declared_total,
                records = outcome.record_count(),
                "Fetched registry records"
            ),
            status => warn!(
                url = %url,
                %status,
                detail = outcome.detail.as_deref().unwrap_or(""),
                "Registry URL not usable"
            ),
        }

        outcome
    }
}

/// Classify a 2xx registry response.
///
/// `Success` requires a JSON content type, a parsable body, a declared
/// `totalCount` above zero, and a non-empty `studies` array.
pub fn classify_response(url: &CandidateUrl, content_type: Option<&str>, body: &[u8]) -> FetchOutcome {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return FetchOutcome::failed(
            url.clone(),
            FetchStatus::InvalidFormat,
            format!("Non-JSON content ({})", content_type.unwrap_or("none")),
        );
    }

    let json: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return FetchOutcome::failed(
                url.clone(),
                FetchStatus::InvalidFormat,
                format!("Invalid JSON body: {}", e),
            )
        }
    };

    let Some(object) = json.as_object() else {
        return FetchOutcome::failed(
            url.clone(),
            FetchStatus::InvalidFormat,
            "Response body is not a JSON object",
        );
    };

    let declared_total = object
        .get("totalCount")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let records: Vec<RawRecord> = match object.get("studies") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(studies)) => studies.iter().cloned().map(RawRecord::new).collect(),
        Some(_) => {
            return FetchOutcome::failed(
                url.clone(),
                FetchStatus::InvalidFormat,
                "'studies' is not an array",
            )
        }
    };

    if declared_total == 0 || records.is_empty() {
        let mut outcome = FetchOutcome::failed(
            url.clone(),
            FetchStatus::Empty,
            format!("Empty result (totalCount: {})", declared_total),
        );
        outcome.declared_total = declared_total;
        return outcome;
    }

    FetchOutcome::success(url.clone(), records, declared_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url() -> CandidateUrl {
        CandidateUrl::from("https://clinicaltrials.gov/api/v2/studies?query.term=asthma")
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_classify_success() {
        let payload = body(json!({
            "totalCount": 120,
            "studies": [
                {"protocolSection": {"identificationModule": {"nctId": "NCT1"}}},
                {"protocolSection": {"identificationModule": {"nctId": "NCT2"}}}
            ]
        }));
        let outcome = classify_response(&url(), Some("application/json;charset=UTF-8"), &payload);

        assert_eq!(outcome.status, FetchStatus::Success);
        assert_eq!(outcome.declared_total, 120);
        assert_eq!(outcome.record_count(), 2);
        assert!(outcome.detail.is_none());
    }

    #[test]
    fn test_classify_non_json_content_type() {
        let outcome = classify_response(&url(), Some("text/html"), b"<html></html>");
        assert_eq!(outcome.status, FetchStatus::InvalidFormat);
        assert!(outcome.record_set.is_none());

        let outcome = classify_response(&url(), None, b"{}");
        assert_eq!(outcome.status, FetchStatus::InvalidFormat);
    }

    #[test]
    fn test_classify_unparsable_body() {
        let outcome = classify_response(&url(), Some("application/json"), b"{not json");
        assert_eq!(outcome.status, FetchStatus::InvalidFormat);
    }

    #[test]
    fn test_classify_empty_results() {
        let zero_total = body(json!({"totalCount": 0, "studies": []}));
        let outcome = classify_response(&url(), Some("application/json"), &zero_total);
        assert_eq!(outcome.status, FetchStatus::Empty);

        let missing_total = body(json!({"studies": [{"protocolSection": {}}]}));
        let outcome = classify_response(&url(), Some("application/json"), &missing_total);
        assert_eq!(outcome.status, FetchStatus::Empty);

        let no_studies = body(json!({"totalCount": 7, "studies": []}));
        let outcome = classify_response(&url(), Some("application/json"), &no_studies);
        assert_eq!(outcome.status, FetchStatus::Empty);
        assert_eq!(outcome.declared_total, 7);
    }

    #[test]
    fn test_classify_studies_not_array() {
        let payload = body(json!({"totalCount": 3, "studies": "nope"}));
        let outcome = classify_response(&url(), Some("application/json"), &payload);
        assert_eq!(outcome.status, FetchStatus::InvalidFormat);
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_classified() {
        let client = RegistryClient::new(&RegistryConfig {
            timeout_seconds: 2,
            ..RegistryConfig::default()
        })
        .unwrap();

        let outcome = client
            .fetch(&CandidateUrl::from("http://127.0.0.1:9/studies"))
            .await;
        assert_eq!(outcome.status, FetchStatus::TransportError);
        assert!(outcome.detail.is_some());
    }
}
