//! Concurrent registry fetching and record deduplication.
//!
//! This module fetches every candidate URL through the registry, then
//! merges successful responses into one corpus keyed by registry identifier.

use crate::models::{AggregatedCorpus, CandidateUrl, FailedUrl, FetchOutcome};
use crate::registry::RegistrySource;
use futures::stream::{self, StreamExt};
use std::collections::btree_map::Entry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches candidate URLs concurrently and builds a deduplicated corpus.
pub struct Aggregator {
    registry: Arc<dyn RegistrySource>,
    max_concurrency: usize,
}

impl Aggregator {
    pub fn new(registry: Arc<dyn RegistrySource>, max_concurrency: usize) -> Self {
        Self {
            registry,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Fetch every URL and merge the successful outcomes.
    ///
    /// Returns only after every dispatched fetch has resolved. Failed URLs
    /// are recorded in the corpus bookkeeping and never abort aggregation.
    pub async fn aggregate(&self, urls: &[CandidateUrl]) -> AggregatedCorpus {
        if urls.is_empty() {
            return AggregatedCorpus::default();
        }

        let workers = self.max_concurrency.min(urls.len());
        debug!(urls = urls.len(), workers, "Dispatching registry fetches");

        // `buffered` keeps dispatch order, so each outcome lands in its URL's slot.
        let outcomes: Vec<FetchOutcome> = stream::iter(urls.iter().cloned().map(|url| {
            let registry = Arc::clone(&self.registry);
            async move { registry.fetch(&url).await }
        }))
        .buffered(workers)
        .collect()
        .await;

        let corpus = merge_outcomes(urls, outcomes);

        info!(
            "Collated {} unique studies from {} of {} sources (raw total {})",
            corpus.unique_count(),
            corpus.source_urls.len(),
            corpus.attempted_urls.len(),
            corpus.raw_total
        );

        corpus
    }
}

/// Merge fetch outcomes into a corpus. The first record seen for an
/// identifier is kept; records without an identifier are skipped.
pub fn merge_outcomes(attempted: &[CandidateUrl], outcomes: Vec<FetchOutcome>) -> AggregatedCorpus {
    let mut corpus = AggregatedCorpus {
        attempted_urls: attempted.to_vec(),
        ..AggregatedCorpus::default()
    };

    for outcome in outcomes {
        if !outcome.is_success() {
            corpus.failed_urls.push(FailedUrl {
                url: outcome.url,
                status: outcome.status,
                detail: outcome.detail,
            });
            continue;
        }

        corpus.raw_total += outcome.declared_total;
        corpus.source_urls.push(outcome.url);

        for record in outcome.record_set.unwrap_or_default() {
            let Some(identifier) = record.identifier().map(str::to_string) else {
                corpus.skipped_records += 1;
                continue;
            };
            match corpus.records.entry(identifier) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(existing) => {
                    debug!(identifier = %existing.key(), "Dropping duplicate record");
                }
            }
        }
    }

    if corpus.skipped_records > 0 {
        warn!("Skipped {} records without an identifier", corpus.skipped_records);
    }

    corpus
}
