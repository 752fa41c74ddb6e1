use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod bootstrap;
mod config;
mod error;
mod experiment;
mod experiments;
mod metrics;
mod models;
mod output;
mod runner;
mod statistics;
mod store;
mod utils;

use crate::config::Settings;
use crate::experiments::{ExperimentRunner, ExperimentsRequest};
use crate::output::OutputFormat;
use crate::runner::{MetricRunner, MetricsRequest};

/// Diversity metrics for generated text, validated against labelled experiments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Do not fetch the dataset archive when the data directory is missing
    #[arg(long)]
    skip_download: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute metrics for response CSVs and write augmented copies
    Metrics {
        /// Comma-separated CSV files or directories (default: raw data directory)
        #[arg(long, default_value = "")]
        input_csv: String,

        /// Comma-separated metric names (default: every default metric)
        #[arg(long, default_value = "")]
        metrics: String,

        /// Recompute external scores even when cached
        #[arg(long)]
        ignore_cache: bool,

        /// Rewrite outputs that already exist
        #[arg(long = "override")]
        override_existing: bool,
    },
    /// Run statistical tests for experiment definitions
    Experiments {
        /// Comma-separated JSON files or directories (default: experiments directory)
        #[arg(long, default_value = "")]
        input_json: String,

        /// Skip chart data files
        #[arg(long)]
        no_plots: bool,

        /// Skip the global results JSON and summary CSVs
        #[arg(long)]
        no_export: bool,
    },
    /// Run a single sub-experiment config JSON
    RunConfig {
        config_json: PathBuf,
    },
    /// List the available metrics
    ListMetrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let settings = Settings::load(args.config.as_deref())?;

    if let Command::ListMetrics = args.command {
        output::print_metric_entries(metrics::registry::METRICS, args.output);
        return Ok(());
    }

    if !args.skip_download {
        bootstrap::download_and_place_data(&settings).await?;
    }

    match args.command {
        Command::Metrics {
            input_csv,
            metrics,
            ignore_cache,
            override_existing,
        } => {
            let request = MetricsRequest {
                input_csv,
                metrics,
                ignore_cache,
                override_existing,
            };
            let reports = MetricRunner::new(&settings, request)?.run().await?;
            output::print_metrics_run(&reports, args.output);
        }
        Command::Experiments {
            input_json,
            no_plots,
            no_export,
        } => {
            let request = ExperimentsRequest {
                input_json,
                publish_plots: !no_plots,
                publish_results: !no_export,
            };
            let reports = ExperimentRunner::new(&settings, request).run()?;
            output::print_reports(&reports, args.output);
        }
        Command::RunConfig { config_json } => {
            let report = experiments::run_config_file(&settings, &config_json)?;
            output::print_reports(std::slice::from_ref(&report), args.output);
        }
        Command::ListMetrics => {}
    }

    Ok(())
}
