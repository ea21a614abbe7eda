//! CodeSage - LLM-powered semantic analysis of source code
//!
//! A CLI tool that splits source files into chunks, asks a local Ollama
//! model for semantic, correctness, edge-case and test-case analyses of
//! each chunk, and merges the answers into a report.
//!
//! Exit codes:
//!   0 - Every job completed
//!   1 - Runtime error, or at least one job failed

mod analysis;
mod cli;
mod config;
mod error;
mod jobs;
mod llm;
mod models;
mod pipeline;
mod report;
mod segmenter;

use anyhow::{Context, Result};
use cli::{is_std_stream, Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use error::JobError;
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use jobs::{JobId, JobTracker, TrackerConfig};
use llm::{OllamaConfig, OllamaConnector};
use models::{AnalysisMode, JobState, JobStatus, Language};
use pipeline::{Pipeline, PipelineConfig};
use report::SourceReport;
use segmenter::Segmenter;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Source code read from one input.
struct Input {
    source: String,
    language: Language,
    code: String,
}

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

    // Initialize logging
    init_logging(&args);

    info!("CodeSage v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .codesage.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize model, retries, chunk size, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so a report written to stdout stays clean.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns the exit code.
async fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let inputs = read_inputs(&args)?;

    // Handle --dry-run: segment and exit
    if args.dry_run {
        return handle_dry_run(&inputs, &config, args.mode);
    }

    eprintln!("🤖 Initializing analysis...");
    eprintln!("   Model: {}", config.model.name);
    eprintln!("   Ollama: {}", config.model.ollama_url);
    eprintln!("   Mode: {}", args.mode);
    eprintln!("   Retries: {}", config.model.retries);
    eprintln!("   Timeout: {}s", config.model.timeout_seconds);

    let connector = Arc::new(OllamaConnector::new(OllamaConfig::from(&config.model)));
    let pipeline = Arc::new(Pipeline::new(connector, PipelineConfig::from(&config)));
    let tracker = JobTracker::new(pipeline, TrackerConfig::from(&config));

    // Submit one job per input
    eprintln!("\n🔬 Submitting {} job(s)...\n", inputs.len());
    let jobs: Vec<(String, JobId)> = inputs
        .into_iter()
        .map(|input| {
            let id = tracker.submit(input.code, input.language, args.mode);
            (input.source, id)
        })
        .collect();

    // Wait for every job, one progress bar each
    let progress = MultiProgress::new();
    let poll_interval = Duration::from_millis(config.general.poll_interval_ms);
    let waits = jobs.iter().map(|(source, id)| {
        let bar = progress.add(new_progress_bar(source, args.quiet));
        wait_for_job(&tracker, id, poll_interval, bar)
    });
    let statuses = join_all(waits).await;

    let mut sources = Vec::with_capacity(jobs.len());
    let mut failed = 0usize;

    for ((source, id), status) in jobs.into_iter().zip(statuses) {
        let status = status?;
        if status.state == JobState::Completed {
            sources.push(SourceReport::completed(source, tracker.result(&id)?));
        } else {
            failed += 1;
            let error = status.error.unwrap_or_else(|| "unknown error".to_string());
            warn!("Job {} for {} failed: {}", id, source, error);
            sources.push(SourceReport::failed(source, id, error));
        }
    }

    // Generate and save the report
    eprintln!("\n📝 Generating report...");

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&sources)?,
        OutputFormat::Markdown => report::generate_markdown_report(&sources),
    };

    let output_path = config.general.output.as_str();
    if is_std_stream(Path::new(output_path)) {
        println!("{}", output);
    } else {
        std::fs::write(output_path, &output)
            .with_context(|| format!("Failed to write report to {}", output_path))?;
    }

    // Print summary
    let failed_outcomes: usize = sources
        .iter()
        .filter_map(|s| s.result.as_ref())
        .map(|r| r.report.metadata.failed_outcomes)
        .sum();

    eprintln!("\n📊 Analysis Summary:");
    eprintln!("   Jobs: {}", tracker.store().len());
    eprintln!("   Completed: {} | Failed: {}", sources.len() - failed, failed);
    eprintln!("   Analyses with fallback text: {}", failed_outcomes);
    eprintln!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    if !is_std_stream(Path::new(output_path)) {
        eprintln!("\n✅ Analysis complete! Report saved to: {}", output_path);
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

/// Create the progress bar shown while a job runs.
fn new_progress_bar(source: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_prefix(source.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Wait for a job while mirroring its status on a progress bar.
async fn wait_for_job(
    tracker: &JobTracker,
    id: &str,
    interval: Duration,
    bar: ProgressBar,
) -> Result<JobStatus, JobError> {
    let status = tracker
        .wait(id, interval, |status| {
            bar.set_position(u64::from(status.progress_percent));
            bar.set_message(status.progress_step.label());
        })
        .await;

    match &status {
        Ok(s) if s.state == JobState::Completed => bar.finish_with_message("Completed"),
        _ => bar.abandon_with_message("Failed"),
    }

    status
}

/// Read every input named on the command line.
fn read_inputs(args: &Args) -> Result<Vec<Input>> {
    args.inputs()
        .into_iter()
        .map(|path| {
            let language = args.language_for(&path);

            if is_std_stream(&path) {
                let mut code = String::new();
                std::io::stdin()
                    .read_to_string(&mut code)
                    .context("Failed to read code from stdin")?;
                return Ok(Input {
                    source: "<stdin>".to_string(),
                    language,
                    code,
                });
            }

            let code = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Input {
                source: path.display().to_string(),
                language,
                code,
            })
        })
        .collect()
}

/// Handle --dry-run: segment every input and print the chunks, no LLM call.
fn handle_dry_run(inputs: &[Input], config: &Config, mode: AnalysisMode) -> Result<i32> {
    println!("\n🔍 Dry run: segmenting input (no LLM call)...\n");

    let pipeline_config = PipelineConfig::from(config).for_mode(mode);
    let segmenter = Segmenter::new(pipeline_config.segmenter)?;

    println!(
        "   Mode: {} | Max chunk size: {} chars | Retries: {}\n",
        mode,
        segmenter.max_chunk_size(),
        pipeline_config.client.max_retries
    );

    let mut total = 0usize;
    for input in inputs {
        let chunks = segmenter.segment(&input.code, input.language);
        total += chunks.len();

        println!(
            "   📄 {} ({}, {} chunks)",
            input.source,
            input.language,
            chunks.len()
        );
        for (i, chunk) in chunks.iter().enumerate() {
            let construct = chunk
                .context
                .construct
                .as_ref()
                .map(|c| format!(" - {} {}", c.kind, c.name))
                .unwrap_or_default();
            println!(
                "     #{} {} lines, {} chars{}",
                i + 1,
                chunk.context.total_lines,
                chunk.char_len(),
                construct
            );
        }
    }

    println!("\n   Total: {} chunks", total);
    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
