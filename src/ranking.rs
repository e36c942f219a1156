//! Relevance ranking of corpus records against the local study profile.

use crate::models::AggregatedCorpus;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Orders corpus identifiers by relevance to a profile.
#[async_trait]
pub trait RelevanceRanker: Send + Sync {
    /// Return identifiers from `corpus`, most relevant first.
    async fn rank(&self, profile: &str, corpus: &AggregatedCorpus) -> Vec<String>;
}

const STOPWORDS: &[&str] = &[
    "and", "are", "but", "for", "from", "had", "has", "have", "into", "its", "not", "of", "our",
    "that", "the", "their", "then", "there", "these", "this", "was", "were", "which", "while",
    "who", "will", "with", "within", "without",
];

/// Term-frequency cosine ranker over the flattened text of each record.
pub struct LexicalRanker {
    top_k: usize,
}

impl LexicalRanker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Score every record and return the `top_k` identifiers.
    ///
    /// Ties are broken by identifier so the order is deterministic.
    pub fn rank_sync(&self, profile: &str, corpus: &AggregatedCorpus) -> Vec<String> {
        let query = term_frequencies(profile);

        let mut scored: Vec<(String, f64)> = corpus
            .records
            .iter()
            .map(|(id, record)| {
                let mut text = String::new();
                flatten_text(record.value(), &mut text);
                (id.clone(), cosine(&query, &term_frequencies(&text)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(self.top_k);

        for (id, score) in &scored {
            debug!(identifier = %id, score, "Ranked record");
        }

        scored.into_iter().map(|(id, _)| id).collect()
    }
}

#[async_trait]
impl RelevanceRanker for LexicalRanker {
    async fn rank(&self, profile: &str, corpus: &AggregatedCorpus) -> Vec<String> {
        self.rank_sync(profile, corpus)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    let norm = |v: &HashMap<String, f64>| v.values().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm(a) * norm(b))
}

/// Collect every string and number leaf of `value` into `out`.
fn flatten_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Number(n) => {
            out.push_str(&n.to_string());
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| flatten_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| flatten_text(v, out)),
        Value::Bool(_) | Value::Null => {}
    }
}
