//! Markdown and JSON report generation.
//!
//! This module renders a [`BenchmarkResult`] as a Markdown benchmark
//! report or as pretty-printed JSON.

use crate::models::{BenchmarkResult, ComparisonResult, CorpusSummary, RunMetadata, RunOutcome, Statistics};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(result: &BenchmarkResult) -> String {
    let mut output = String::new();

    output.push_str("# TrialBench Report\n\n");

    output.push_str(&generate_metadata_section(result));
    output.push_str(&generate_discovery_section(&result.discovery));
    output.push_str(&generate_local_profile_section(&result.local_profile));
    output.push_str(&generate_summary_section(result));
    output.push_str(&generate_statistics_section(&result.final_report.statistics));
    output.push_str(&generate_comparisons_section(result));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(result: &BenchmarkResult) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Query:** {}\n", result.query));
    if let Some(RunMetadata {
        run_date,
        model_used,
        registry_url,
        duration_seconds,
    }) = &result.metadata
    {
        section.push_str(&format!(
            "- **Run Date:** {}\n",
            run_date.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        section.push_str(&format!("- **Model Used:** `{}`\n", model_used));
        section.push_str(&format!("- **Registry:** {}\n", registry_url));
        section.push_str(&format!("- **Duration:** {:.1}s\n", duration_seconds));
    }
    section.push_str(&format!(
        "- **Trials Compared:** {}\n",
        result.selected_identifiers.len()
    ));
    let failed = result.failed_comparisons();
    if failed > 0 {
        section.push_str(&format!("- **Failed Comparisons:** {}\n", failed));
    }
    section.push('\n');

    section
}

fn generate_discovery_section(discovery: &CorpusSummary) -> String {
    let mut section = String::new();

    section.push_str("## Discovery\n\n");
    section.push_str("| Cycles | URLs Attempted | URLs With Records | Unique Trials | Raw Total |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        discovery.discovery_cycles,
        discovery.attempted_urls.len(),
        discovery.source_urls.len(),
        discovery.unique_records,
        discovery.raw_total
    ));

    if !discovery.source_urls.is_empty() {
        section.push_str("<details>\n<summary>Registry queries</summary>\n\n");
        for url in &discovery.source_urls {
            section.push_str(&format!("- `{}`\n", url));
        }
        for failed in &discovery.failed_urls {
            section.push_str(&format!("- `{}` ({})\n", failed.url, failed.status));
        }
        section.push_str("\n</details>\n\n");
    }

    section
}

fn generate_local_profile_section(profile: &str) -> String {
    if profile.is_empty() {
        return String::new();
    }

    format!(
        "## Local Study Profile\n\n<details>\n<summary>View profile</summary>\n\n{}\n\n</details>\n\n",
        profile
    )
}

fn generate_summary_section(result: &BenchmarkResult) -> String {
    let mut section = String::new();

    section.push_str("## Executive Summary\n\n");

    if let RunOutcome::NoReferenceRecords { reason } = &result.outcome {
        section.push_str(&format!("> ⚠️ Discovery failed: {}\n\n", reason));
    } else if result.final_report.degraded {
        section.push_str("> ⚠️ The synthesis could not be parsed; showing the raw text.\n\n");
    }

    section.push_str(result.final_report.narrative.trim());
    section.push_str("\n\n");

    section
}

fn generate_statistics_section(stats: &Statistics) -> String {
    if stats.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    let cell = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));

    section.push_str("## Statistics\n\n");
    section.push_str("| Precision | Recall | F1 Score |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        cell(stats.precision),
        cell(stats.recall),
        cell(stats.f1_score)
    ));

    if !stats.similarity.is_empty() {
        let mut scores = stats.similarity.clone();
        scores.sort_by(|a, b| b.percentage_similarity.total_cmp(&a.percentage_similarity));

        section.push_str("### Similarity\n\n");
        section.push_str("| Trial | Similarity |\n");
        section.push_str("|:---|:---:|\n");
        for score in &scores {
            section.push_str(&format!(
                "| {} | {:.1}% |\n",
                score.trial_id, score.percentage_similarity
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_comparisons_section(result: &BenchmarkResult) -> String {
    let comparisons = result.ordered_comparisons();
    if comparisons.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Trial Comparisons\n\n");

    for comparison in comparisons.iter().filter(|c| !c.failed) {
        section.push_str(&generate_comparison_block(comparison));
    }

    let failed: Vec<_> = comparisons.iter().filter(|c| c.failed).collect();
    if !failed.is_empty() {
        section.push_str("### Failed Comparisons\n\n");
        for comparison in failed {
            section.push_str(&format!(
                "- **{}:** {}\n",
                comparison.identifier, comparison.text
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_comparison_block(comparison: &ComparisonResult) -> String {
    format!(
        "### [{id}](https://clinicaltrials.gov/study/{id})\n\n{}\n\n---\n\n",
        comparison.text.trim(),
        id = comparison.identifier
    )
}

fn generate_footer() -> String {
    "---\n\n*Report generated by TrialBench*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(result: &BenchmarkResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Write rendered report content to `path`.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
