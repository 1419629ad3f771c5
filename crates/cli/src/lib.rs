//! CLI for Benchwatch.
//!
//! This crate provides the `benchwatch` command-line interface: ingest a
//! benchmark run into the history, inspect series and their trends, and
//! move history in and out of the dashboard `data.js` format.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod commands;

use anyhow::Context;
use benchwatch_core::{AppConfig, LoggingConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Benchwatch CLI.
#[derive(Parser, Debug)]
#[command(name = "benchwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./benchwatch.toml if present).
    #[arg(short, long, global = true, env = "BENCHWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// History file override.
    #[arg(long, global = true)]
    pub history: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for `series`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table.
    Text,
    /// JSON trend points.
    Json,
    /// Markdown report.
    Markdown,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a benchmark run and classify every benchmark in it.
    ///
    /// The input is a JSON run payload: one commit, one tool and a list of
    /// benchmarks. Use `-` to read it from stdin.
    Ingest {
        /// Run payload file.
        input: PathBuf,

        /// Write the outcome exports as JSON to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a Markdown summary to this file.
        #[arg(short, long)]
        summary: Option<PathBuf>,

        /// Exit with status 2 when any benchmark regressed.
        #[arg(long)]
        fail_on_regression: bool,
    },

    /// Show a series and its trend.
    Series {
        /// Tool name.
        tool: String,

        /// Benchmark name (exact match).
        benchmark: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Import history from a dashboard `data.js` file.
    Import {
        /// Dashboard data file.
        input: PathBuf,
    },

    /// Export the history as a dashboard `data.js` file.
    Export {
        /// Destination file.
        output: PathBuf,

        /// Repository URL override.
        #[arg(long)]
        repo_url: Option<String>,

        /// Suite name override.
        #[arg(long)]
        suite: Option<String>,
    },

    /// Rewrite the history snapshot.
    Checkpoint,

    /// Show history and configuration status.
    Status {
        /// List every series.
        #[arg(short, long)]
        detailed: bool,
    },
}

/// Initialise the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Run the CLI with the process arguments.
///
/// # Returns
///
/// The exit code on success, or an error if the command fails.
pub async fn run() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(history) = &cli.history {
        config.storage.history_path = history.clone();
    }
    init_tracing(&config.logging, cli.verbose);

    execute(cli.command, &config).await
}

/// Execute one command against `config`.
pub async fn execute(command: Commands, config: &AppConfig) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Ingest {
            input,
            output,
            summary,
            fail_on_regression,
        } => {
            let report =
                commands::ingest(config, &input, output.as_deref(), summary.as_deref()).await?;
            if fail_on_regression && report.has_regressions() {
                return Ok(ExitCode::from(2));
            }
            if !report.is_complete() {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Series {
            tool,
            benchmark,
            format,
        } => {
            commands::series(config, &tool, &benchmark, format).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Import { input } => {
            commands::import(config, &input).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Export {
            output,
            repo_url,
            suite,
        } => {
            commands::export(config, &output, repo_url, suite).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Checkpoint => {
            commands::checkpoint(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { detailed } => {
            commands::status(config, detailed).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
