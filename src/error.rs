//! Error taxonomy for the benchmarking pipeline.
//!
//! Most of these never reach the caller: per-URL errors are absorbed by the
//! aggregator, unit failures become data in the fan-out, and a degraded
//! synthesis still yields a report.

use thiserror::Error;

/// Errors raised by pipeline components and external collaborators.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BenchError {
    /// Network failure or timeout talking to an external service.
    #[error("transport error: {0}")]
    Transport(String),

    /// Wrong content type or an unparsable body.
    #[error("invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// A well-formed response that carried no usable records.
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// The completion service never produced a valid query plan.
    #[error("query planning exhausted after {attempts} attempts: {last_error}")]
    PlanningExhausted { attempts: usize, last_error: String },

    /// One comparison unit failed. Always isolated inside the fan-out.
    #[error("comparison for {identifier} failed: {reason}")]
    UnitFailure { identifier: String, reason: String },

    /// The final synthesis could not be parsed. Always recovered.
    #[error("synthesis degraded: {0}")]
    SynthesisDegraded(String),

    /// The completion service answered with an error status.
    #[error("completion service error: {0}")]
    Completion(String),

    /// Invalid configuration or client construction failure.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BenchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BenchError::InvalidResponseFormat(e.to_string())
        } else {
            BenchError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_exhausted_message() {
        let err = BenchError::PlanningExhausted {
            attempts: 3,
            last_error: "no urls".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "query planning exhausted after 3 attempts: no urls"
        );
    }

    #[test]
    fn test_unit_failure_message() {
        let unit = BenchError::UnitFailure {
            identifier: "NCT00000001".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(unit.to_string(), "comparison for NCT00000001 failed: timeout");
    }
}
