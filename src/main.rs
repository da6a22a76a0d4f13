//! CLI Entry Point for coex-bench
//!
//! Provides command-line interface for:
//! - Listing the profiles discovered in the project directory
//! - Parsing a saved console capture offline
//! - Running every built profile against the board on the serial console
//!
//! # Usage
//!
//! Run all built profiles:
//! ```bash
//! coex-bench run --port /dev/ttyUSB0
//! ```
//!
//! Run a specific profile:
//! ```bash
//! coex-bench run -k balanced
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coex_bench::config::{HarnessConfig, DEFAULT_CONFIG_PATH};
use coex_bench::dut::SerialConnector;
use coex_bench::parser::parse_throughput_output;
use coex_bench::profile::{discover_profiles, select_profiles};
use coex_bench::results::ResultsAggregator;
use coex_bench::runner::{accept_results, run_all, ProfileOutcome};
use coex_bench::tracing_setup::{self, OutputFormat, TracingConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "coex-bench")]
#[command(about = "WiFi/BLE coexistence throughput harness", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the profiles discovered in the project directory
    Profiles {
        /// Directory holding sdkconfig.<profile> files
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },

    /// Parse a saved console capture and print its results
    Parse {
        /// Capture file
        capture: PathBuf,

        /// Profile label used in the report
        #[arg(long, default_value = "capture")]
        profile: String,
    },

    /// Run every built profile against the board
    Run {
        /// Only run profiles whose name contains this text
        #[arg(short = 'k', long)]
        filter: Option<String>,

        /// Directory holding sdkconfig.<profile> files and build_<profile> directories
        #[arg(long)]
        project_dir: Option<PathBuf>,

        /// Serial console of the board
        #[arg(long)]
        port: Option<String>,

        /// Write the results as JSON to this file
        #[arg(long)]
        results: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = HarnessConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.validate()?;

    let level = tracing_setup::parse_log_level(&config.log_level)?;
    tracing_setup::init(TracingConfig::new(level).with_format(cli.log_format))?;

    match cli.command {
        Commands::Profiles { project_dir } => list_profiles(config, project_dir),
        Commands::Parse { capture, profile } => parse_capture(capture, &profile),
        Commands::Run {
            filter,
            project_dir,
            port,
            results,
        } => {
            if let Some(dir) = project_dir {
                config.project_dir = dir;
            }
            if let Some(port) = port {
                config.serial.port = port;
            }
            if results.is_some() {
                config.report.results_file = results;
            }
            run(config, filter.as_deref()).await
        }
    }
}

fn list_profiles(config: HarnessConfig, project_dir: Option<PathBuf>) -> Result<ExitCode> {
    let dir = project_dir.unwrap_or(config.project_dir);
    let profiles = discover_profiles(&dir)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    let mut out = io::stdout().lock();
    for profile in profiles {
        writeln!(out, "{profile}")?;
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_capture(capture: PathBuf, profile: &str) -> Result<ExitCode> {
    let bytes = std::fs::read(&capture)
        .with_context(|| format!("Failed to read {}", capture.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    let parsed = parse_throughput_output(&text);
    let mut aggregator = ResultsAggregator::new();
    let verdict = accept_results(profile, &parsed, &mut aggregator);

    aggregator.write_table(&mut io::stdout().lock())?;

    match verdict {
        Ok(entries) => {
            info!(entries, "capture passed");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(config: HarnessConfig, filter: Option<&str>) -> Result<ExitCode> {
    let profiles = discover_profiles(&config.project_dir)
        .with_context(|| format!("Failed to scan {}", config.project_dir.display()))?;
    let profiles = select_profiles(profiles, filter);
    if profiles.is_empty() {
        bail!(
            "No profiles found in {} (expected sdkconfig.<profile> files)",
            config.project_dir.display()
        );
    }
    info!(count = profiles.len(), "running profiles: {}", profiles.join(", "));

    let connector = SerialConnector::new(config.serial.port.clone(), config.serial.baud_rate);
    let mut aggregator = ResultsAggregator::new();
    let summary = run_all(&profiles, &connector, &config, &mut aggregator).await;

    aggregator.write_table(&mut io::stdout().lock())?;
    if let Some(path) = &config.report.results_file {
        aggregator.save_json(path)?;
    }

    for (profile, outcome) in &summary.outcomes {
        match outcome {
            ProfileOutcome::Passed { .. } => {}
            ProfileOutcome::Skipped { reason } => info!(profile = %profile, "SKIPPED: {reason}"),
            ProfileOutcome::Failed { error } => error!(profile = %profile, "FAILED: {error}"),
        }
    }

    if summary.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
