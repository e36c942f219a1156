//! Cross-reference ranked identifiers against the aggregated corpus.

use crate::models::{AggregatedCorpus, SelectedTrial};
use std::collections::HashSet;
use tracing::debug;

/// Pick corpus records in the order given by `ranked_identifiers`.
///
/// Identifiers not present in the corpus are skipped, as are repeats.
/// No cap is applied here.
pub fn select(corpus: &AggregatedCorpus, ranked_identifiers: &[String]) -> Vec<SelectedTrial> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for identifier in ranked_identifiers {
        if !seen.insert(identifier.as_str()) {
            continue;
        }
        match corpus.records.get(identifier) {
            Some(record) => {
                debug!(identifier = %identifier, "Matched ranked identifier");
                selected.push(SelectedTrial {
                    identifier: identifier.clone(),
                    record: record.clone(),
                });
            }
            None => debug!(identifier = %identifier, "Ranked identifier not in corpus"),
        }
    }

    selected
}
