//! Completion service client and structured-output helpers.
//!
//! The pipeline only needs one operation from the completion service:
//! send a role-tagged instruction plus free text and get free text back.

pub mod json;
pub mod ollama;

use crate::error::BenchError;
use async_trait::async_trait;

pub use json::parse_structured;
pub use ollama::{CompletionConfig, OllamaClient};

/// An external text completion service.
///
/// Implementations are shared across fan-out workers and must be safe to
/// call concurrently.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send a system instruction and a user message, returning the reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, BenchError>;

    /// Model name used for reporting.
    fn model_name(&self) -> &str;
}
