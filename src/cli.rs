//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// TrialBench - benchmark a local study against registered clinical trials
///
/// Discovers comparable trials in the registry, compares each one with the
/// local study profile using an LLM, and writes a combined report.
///
/// Examples:
///   trialbench --query "How does our study compare?" --profile profile.md
///   trialbench --query "Compare endpoints" --source paper.txt --format json
///   trialbench --query "Find similar trials" --profile profile.md --dry-run
///   trialbench --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Question or benchmarking focus for the comparison
    #[arg(short, long, value_name = "TEXT", required_unless_present = "init_config")]
    pub query: Option<String>,

    /// File containing a prepared local study profile
    #[arg(short, long, value_name = "FILE", conflicts_with = "source")]
    pub profile: Option<PathBuf>,

    /// File containing raw study text to build the profile from
    #[arg(short, long, value_name = "FILE")]
    pub source: Option<PathBuf>,

    /// Completion model to use
    ///
    /// Can also be set via TRIALBENCH_MODEL env var or .trialbench.toml config.
    #[arg(short, long, env = "TRIALBENCH_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Registry API base URL
    #[arg(long, value_name = "URL")]
    pub registry_url: Option<String>,

    /// Output file path for the report
    ///
    /// Defaults to `general.output` from the config file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Maximum number of trials to compare
    #[arg(long, value_name = "COUNT")]
    pub max_trials: Option<usize>,

    /// Number of concurrent registry fetches and comparisons
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Per-request completion timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Timeout for the whole run in seconds
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trialbench.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(long)]
    pub quiet: bool,

    /// Dry run: plan and aggregate registry records without comparisons
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .trialbench.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The user query, empty if not set (should be validated first).
    pub fn query_text(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.query_text().trim().is_empty() {
            return Err("Query must not be empty".to_string());
        }

        if self.profile.is_none() && self.source.is_none() {
            return Err("Either --profile or --source is required".to_string());
        }

        for path in [&self.profile, &self.source].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref url) = self.registry_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Registry URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_trials == Some(0) {
            return Err("Max trials must be at least 1".to_string());
        }

        if self.timeout == Some(0) || self.run_timeout == Some(0) {
            return Err("Timeouts must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over a config file that enables verbose logging.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
