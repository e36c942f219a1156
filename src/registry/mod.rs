//! Clinical-trial registry access.
//!
//! This module fetches candidate query URLs and classifies each response.
//! Failures are carried in the returned outcome and never raised.

pub mod client;

use crate::models::{CandidateUrl, FetchOutcome};
use async_trait::async_trait;

pub use client::RegistryClient;

/// A source of registry records, one GET per candidate URL.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Fetch and classify a single URL. Never fails.
    async fn fetch(&self, url: &CandidateUrl) -> FetchOutcome;
}
