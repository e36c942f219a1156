//! TrialBench - benchmark a local clinical study against registered trials
//!
//! A CLI tool that plans registry queries with an LLM, aggregates matching
//! trials, compares each one with the local study profile in parallel, and
//! writes a combined benchmark report.
//!
//! Exit codes:
//!   0 - Success (including a run that found no reference trials)
//!   1 - Runtime error (connection, config, file IO, etc.)
//!   3 - The run exceeded --run-timeout

mod cli;
mod comparison;
mod config;
mod discovery;
mod error;
mod llm;
mod models;
mod pipeline;
mod profile;
mod prompts;
mod ranking;
mod registry;
mod report;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use llm::{CompletionConfig, CompletionService, OllamaClient};
use models::RunOutcome;
use pipeline::Orchestrator;
use ranking::LexicalRanker;
use registry::RegistryClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const EXIT_TIMEOUT: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config first: its verbosity feeds the log level
    let (config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(args.log_level(config.general.verbose));

    info!("TrialBench v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
        ConfigSource::Default => info!("Loaded default config from {}", DEFAULT_CONFIG_FILE),
        ConfigSource::Builtin => debug!("No config file found, using defaults"),
        ConfigSource::Unreadable(reason) => warn!("Failed to load config: {}", reason),
    }

    match run_benchmark(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Benchmark failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .trialbench.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the model, registry, retries, and concurrency.");
    Ok(())
}

/// Initialize logging at `level`.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the benchmark workflow. Returns the process exit code.
async fn run_benchmark(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();
    let output_path = PathBuf::from(&config.general.output);

    // Step 1: Initialize clients
    println!("🤖 Initializing clients...");
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    println!("   Registry: {}", config.registry.base_url);

    let completion: Arc<dyn CompletionService> =
        Arc::new(OllamaClient::new(CompletionConfig::from(&config.model))?);
    let registry = Arc::new(RegistryClient::new(&config.registry)?);
    let ranker = Arc::new(LexicalRanker::new(config.ranking.top_k));

    // Step 2: Obtain the local study profile
    let local_profile = get_local_profile(&args, completion.as_ref()).await?;
    info!("Local study profile: {} chars", local_profile.len());

    let mut orchestrator = Orchestrator::new(&config, Arc::clone(&completion), registry, ranker);

    // Handle --dry-run: discovery only
    if args.dry_run {
        return handle_dry_run(&orchestrator, &local_profile).await;
    }

    if !args.quiet {
        orchestrator = orchestrator.with_progress(comparison_progress_bar());
    }

    // Step 3: Run the pipeline under the caller-level timeout
    println!("\n🔬 Running benchmark...");
    println!(
        "   Up to {} discovery cycles, {} trials, {} workers",
        config.discovery.max_cycles, config.comparison.max_trials, config.comparison.concurrency
    );

    let run_timeout = Duration::from_secs(config.general.run_timeout_seconds);
    let result = match orchestrator
        .run_with_deadline(args.query_text(), &local_profile, run_timeout)
        .await
    {
        Ok(result) => result,
        Err(_) => {
            error!("Run exceeded {}s timeout", run_timeout.as_secs());
            eprintln!(
                "\n⏱️  Benchmark timed out after {}s; in-flight requests were abandoned.",
                run_timeout.as_secs()
            );
            return Ok(EXIT_TIMEOUT);
        }
    };

    // Step 4: Generate and save the report
    println!("\n📝 Generating report...");

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&result)?,
        OutputFormat::Markdown => report::generate_markdown_report(&result),
    };
    report::write_report(&output, &output_path)?;

    // Print summary
    println!("\n📊 Benchmark Summary:");
    println!(
        "   Discovery cycles: {} | Unique trials: {} | Raw total: {}",
        result.discovery.discovery_cycles,
        result.discovery.unique_records,
        result.discovery.raw_total
    );
    println!(
        "   Compared: {} ({} failed)",
        result.selected_identifiers.len(),
        result.failed_comparisons()
    );
    if result.final_report.degraded {
        println!("   ⚠️  Synthesis degraded: report contains unstructured text");
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    match result.outcome {
        RunOutcome::Completed => println!(
            "\n✅ Benchmark complete! Report saved to: {}",
            output_path.display()
        ),
        RunOutcome::NoReferenceRecords { ref reason } => {
            warn!("{}", reason);
            println!(
                "\n⚠️  No reference trials found. Report saved to: {}",
                output_path.display()
            );
        }
    }

    Ok(0)
}

/// Handle --dry-run: plan and aggregate, print the corpus, exit.
async fn handle_dry_run(orchestrator: &Orchestrator, local_profile: &str) -> Result<i32> {
    println!("\n🔍 Dry run: discovering reference trials (no comparisons)...\n");

    let discovery = orchestrator.discover(local_profile).await;
    let corpus = &discovery.corpus;

    println!("   Discovery cycles: {}", discovery.cycles);
    for url in &corpus.source_urls {
        println!("     ✅ {}", url);
    }
    for failed in &corpus.failed_urls {
        println!("     ❌ {} ({})", failed.url, failed.status);
    }

    if corpus.is_empty() {
        println!("\n   No reference trials found.");
        if let Some(ref reason) = discovery.last_failure {
            println!("   Last failure: {}", reason);
        }
    } else {
        println!(
            "\n   Found {} unique trials (raw total {}):\n",
            corpus.unique_count(),
            corpus.raw_total
        );
        for identifier in corpus.records.keys() {
            println!("     📄 {}", identifier);
        }
    }

    println!("\n✅ Dry run complete. No comparisons were made.");
    Ok(0)
}

/// Progress bar for the comparison fan-out.
fn comparison_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} comparisons")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Load a prepared profile or synthesize one from the source text.
async fn get_local_profile(args: &Args, completion: &dyn CompletionService) -> Result<String> {
    if let Some(ref path) = args.profile {
        info!("Loading local study profile from: {}", path.display());
        return profile::load_profile(path);
    }

    let path = args
        .source
        .as_ref()
        .context("Either --profile or --source is required")?;
    println!("🧬 Building local study profile from {}...", path.display());

    let source_text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source text: {}", path.display()))?;
    profile::synthesize_profile(completion, &source_text).await
}

/// Where the configuration came from, logged once logging is up.
enum ConfigSource {
    Explicit(PathBuf),
    Default,
    Builtin,
    Unreadable(String),
}

/// Load the configuration, merge CLI overrides, and validate the result.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    let (mut config, source) = match args.config {
        Some(ref path) => (Config::load(path)?, ConfigSource::Explicit(path.clone())),
        None => match Config::load_default() {
            Ok(Some(config)) => (config, ConfigSource::Default),
            Ok(None) => (Config::default(), ConfigSource::Builtin),
            Err(e) => (Config::default(), ConfigSource::Unreadable(format!("{:#}", e))),
        },
    };

    config.merge_with_args(args);
    config.validate().context("Invalid configuration")?;
    Ok((config, source))
}
