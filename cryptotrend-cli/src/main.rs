//! CryptoTrend CLI: pipeline runs, single stages, scheduling, and config.
//!
//! Commands:
//! - `run`: execute the full stage graph once
//! - `stage <name>`: execute one stage entry point
//! - `schedule`: run the graph on a fixed interval
//! - `config`: print the resolved configuration as TOML

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use cryptotrend_core::data::CoinGeckoProvider;
use cryptotrend_runner::{FixedInterval, Pipeline, PipelineConfig, RunReport, StageId, StageOutcome};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "cryptotrend",
    version,
    about = "CryptoTrend CLI: crypto market ETL pipeline"
)]
struct Cli {
    /// TOML config file. Defaults come from CRYPTOTREND_HOME otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the full stage graph once.
    Run {
        /// Print the run report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Execute a single stage, ignoring its dependencies.
    Stage {
        #[arg(value_enum)]
        stage: StageArg,
    },
    /// Run the graph on the configured fixed interval.
    Schedule {
        /// Stop after this many scheduled runs.
        #[arg(long)]
        max_runs: Option<u64>,

        /// Also run once right away before waiting for the first tick.
        #[arg(long, default_value_t = false)]
        immediate: bool,
    },
    /// Print the resolved configuration as TOML.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Ingest,
    Clean,
    Classify,
    Report,
    Publish,
}

impl From<StageArg> for StageId {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Ingest => StageId::Ingest,
            StageArg::Clean => StageId::Clean,
            StageArg::Classify => StageId::Classify,
            StageArg::Report => StageId::Report,
            StageArg::Publish => StageId::Publish,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { json } => run_once(config, json),
        Commands::Stage { stage } => run_stage(config, stage.into()),
        Commands::Schedule {
            max_runs,
            immediate,
        } => run_schedule(config, max_runs, immediate),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn build_pipeline(config: PipelineConfig) -> Result<Pipeline> {
    let provider = CoinGeckoProvider::new(
        config.api.base_url.clone(),
        config.markets_query(),
        config.timeout(),
    )?;
    Ok(Pipeline::new(config, Box::new(provider)))
}

fn run_once(config: PipelineConfig, json: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let report = pipeline.run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_stage(config: PipelineConfig, stage: StageId) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    match pipeline.run_stage(stage, Local::now()) {
        Ok(detail) => {
            println!("{stage}: {detail}");
            Ok(())
        }
        Err(err) => {
            eprintln!("{stage} failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run_schedule(config: PipelineConfig, max_runs: Option<u64>, immediate: bool) -> Result<()> {
    let hours = config.schedule.interval_hours;
    let interval = FixedInterval::every_hours(hours)
        .ok_or_else(|| anyhow!("schedule.interval_hours must be positive"))?;
    let pipeline = build_pipeline(config)?;
    info!(interval_hours = hours, ?max_runs, "scheduler started");

    let run = |n: u64| match pipeline.run() {
        Ok(report) => print_report(&report),
        Err(e) => error!(run = n, error = %e, "pipeline graph is invalid"),
    };

    if immediate {
        run(0);
    }
    let runs = interval.run(max_runs, run);
    info!(runs, "scheduler stopped");
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("=== Run {} ===", report.run_timestamp);
    for stage in StageId::ALL {
        let line = match report.outcome(stage) {
            Some(StageOutcome::Succeeded { detail }) => format!("ok       {detail}"),
            Some(StageOutcome::Failed { error }) => format!("FAILED   {error}"),
            Some(StageOutcome::Skipped { blocked_by }) => {
                format!("skipped  blocked by {}", blocked_by.join(", "))
            }
            None => "not run".to_string(),
        };
        println!("  {:<32} {line}", stage.task_id());
    }
    let elapsed = report.finished_at - report.started_at;
    println!(
        "  {} in {:.1}s",
        if report.succeeded() { "succeeded" } else { "did not complete" },
        elapsed.num_milliseconds() as f64 / 1000.0
    );
}
