//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trialbench.toml` files. Each pipeline component receives its own
//! section at construction time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".trialbench.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Completion service settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Registry API settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Query planning and discovery retry settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Comparison fan-out settings.
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Relevance ranking settings.
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Timeout for the whole pipeline run, in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

fn default_output() -> String {
    "trialbench_report.md".to_string()
}

fn default_run_timeout() -> u64 {
    3600
}

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    600
}

/// Registry API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL every planned query must start with.
    #[serde(default = "default_registry_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_registry_timeout")]
    pub timeout_seconds: u64,

    /// Maximum concurrent registry fetches.
    #[serde(default = "default_fanout")]
    pub concurrency: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_url(),
            timeout_seconds: default_registry_timeout(),
            concurrency: default_fanout(),
        }
    }
}

fn default_registry_url() -> String {
    "https://clinicaltrials.gov/api/v2".to_string()
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_fanout() -> usize {
    5
}

/// Query planning and discovery retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Completion attempts per query plan.
    #[serde(default = "default_planner_attempts")]
    pub planner_attempts: usize,

    /// Base delay for exponential backoff between planner attempts.
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,

    /// Plan+aggregate cycles before giving up on discovery.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,

    /// Maximum characters of profile text sent to the planner.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            planner_attempts: default_planner_attempts(),
            backoff_base_ms: default_backoff_ms(),
            max_cycles: default_max_cycles(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

impl DiscoveryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn default_planner_attempts() -> usize {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_max_cycles() -> usize {
    5
}

fn default_max_query_chars() -> usize {
    1000
}

/// Comparison fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Maximum concurrent comparison requests.
    #[serde(default = "default_fanout")]
    pub concurrency: usize,

    /// Maximum number of selected trials compared per run.
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            concurrency: default_fanout(),
            max_trials: default_max_trials(),
        }
    }
}

fn default_max_trials() -> usize {
    5
}

/// Relevance ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Number of ranked identifiers requested from the ranker.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(ref url) = args.registry_url {
            self.registry.base_url = url.clone();
        }
        if let Some(run_timeout) = args.run_timeout {
            self.general.run_timeout_seconds = run_timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.comparison.concurrency = concurrency;
            self.registry.concurrency = concurrency;
        }
        if let Some(max_trials) = args.max_trials {
            self.comparison.max_trials = max_trials;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.to_string_lossy().into_owned();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.registry.concurrency == 0 || self.comparison.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if self.comparison.max_trials == 0 {
            anyhow::bail!("max_trials must be at least 1");
        }
        if self.discovery.planner_attempts == 0 || self.discovery.max_cycles == 0 {
            anyhow::bail!("planner_attempts and max_cycles must be at least 1");
        }
        if !self.registry.base_url.starts_with("http://")
            && !self.registry.base_url.starts_with("https://")
        {
            anyhow::bail!("Registry URL must start with 'http://' or 'https://'");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
