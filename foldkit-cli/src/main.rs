//! foldkit CLI
//!
//! Runs a resampled tuning workflow described by a JSON file over a CSV or Parquet
//! file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use foldkit::core::DataFrame;
use foldkit::io::{load_json, read_csv, read_parquet, save_json, write_csv, write_parquet, IoResult};
use foldkit::tune::describe;
use foldkit::{Workflow, WorkflowConfig, WorkflowReport};

#[derive(Parser)]
#[command(name = "foldkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resampled tuning and evaluation of tabular models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split, resample, tune, select and refit
    Run {
        /// Input data: Parquet when the name ends in `.parquet`, otherwise CSV with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// Workflow configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Write every fold result here (CSV, or Parquet by extension)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Write the per-configuration summary here (CSV, or Parquet by extension)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Save the final prepared recipe and model here (JSON)
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Check a workflow configuration without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foldkit=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            results,
            summary,
            model,
        } => cmd_run(&data, &config, results.as_deref(), summary.as_deref(), model.as_deref())?,
        Commands::Validate { config } => {
            load_config(&config)?;
            println!("{} is valid", config.display());
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<WorkflowConfig> {
    let config: WorkflowConfig =
        load_json(path).with_context(|| format!("reading configuration {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    Ok(config)
}

fn is_parquet(path: &Path) -> bool {
    path.extension().map_or(false, |e| e.eq_ignore_ascii_case("parquet"))
}

/// Parquet by `.parquet` extension, CSV otherwise.
fn read_frame(path: &Path) -> IoResult<DataFrame> {
    if is_parquet(path) {
        read_parquet(path)
    } else {
        read_csv(path)
    }
}

fn write_frame(path: &Path, frame: &DataFrame) -> IoResult<()> {
    if is_parquet(path) {
        write_parquet(path, frame)
    } else {
        write_csv(path, frame)
    }
}

fn cmd_run(
    data: &Path,
    config: &Path,
    results: Option<&Path>,
    summary: Option<&Path>,
    model: Option<&Path>,
) -> anyhow::Result<()> {
    let workflow = Workflow::new(load_config(config)?)?;
    let frame = read_frame(data).with_context(|| format!("reading data {}", data.display()))?;
    info!(rows = frame.n_rows(), columns = frame.n_cols(), "data loaded");

    let report = workflow.run(&frame)?;

    if let Some(path) = results {
        write_frame(path, &report.results.to_frame()?)
            .with_context(|| format!("writing fold results {}", path.display()))?;
    }
    if let Some(path) = summary {
        write_frame(path, &report.summary.to_frame()?)
            .with_context(|| format!("writing summary {}", path.display()))?;
    }
    if let Some(path) = model {
        save_json(&report.final_fit, path).with_context(|| format!("saving model {}", path.display()))?;
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &WorkflowReport) {
    let metric = report.summary.metric;
    println!(
        "{} on {} train / {} test rows, {} folds",
        report.summary.family,
        report.split.train_indices().len(),
        report.split.test_indices().len(),
        report.plan.len()
    );
    if !report.results.is_complete() {
        println!(
            "budget reached: {:.0}% of cells ran",
            100.0 * report.results.completion_fraction()
        );
        println!("configurations marked * did not run every fold and were not considered");
    }
    if !report.dropped.is_empty() {
        println!("dropped before splitting: {}", report.dropped.join(", "));
    }

    println!();
    println!("{:<40} {:>12} {:>12} {:>8}", "configuration", metric.name(), "std_err", "folds");
    for row in &report.summary.rows {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
        println!(
            "{:<40} {:>12} {:>12} {:>8}",
            describe(&row.config),
            fmt(row.mean),
            fmt(row.std_err),
            if row.complete { row.n_scored.to_string() } else { format!("{}*", row.n_scored) }
        );
    }

    println!();
    println!("selected: {}", describe(&report.selected.config));
    println!("test {}: {:.4}", metric.name(), report.final_fit.test_metric);
    println!("importance:");
    for (name, score) in &report.final_fit.importance {
        println!("  {:<30} {:>6.1}", name, score);
    }
}
