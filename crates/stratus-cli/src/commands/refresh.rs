//! Refresh command - rebuild the catalog tables from the platform.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use stratus_catalog::{CollectorConfig, RefreshRunner, RunReport};

use crate::{Config, OutputFormat};

/// Arguments for the refresh command.
#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Which pipelines to run.
    #[arg(long, value_enum, default_value = "all")]
    pub target: RefreshTarget,

    /// Storage provider class to retain for volume locations.
    #[arg(long, default_value = "S3")]
    pub provider: String,

    /// Per-call timeout for registry fetches, in seconds.
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Maximum descriptor fetches in flight at once.
    #[arg(long, default_value = "8")]
    pub max_in_flight: usize,
}

/// Refresh target selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RefreshTarget {
    /// Volume-path pipeline only.
    Volumes,
    /// Stage-path pipeline only.
    Stages,
    /// Both pipelines, concurrently.
    All,
}

/// Execute the refresh command.
///
/// # Errors
///
/// Returns an error if a run fails outright; per-entity skips are
/// reported but do not fail the command.
pub async fn execute(args: RefreshArgs, config: &Config) -> Result<()> {
    let repository = super::repository(config)?;
    let registry = super::registry(config)?;
    let ctx = super::platform_context(config)?;

    let runner = RefreshRunner::new(registry, repository).with_config(CollectorConfig {
        provider: args.provider.clone(),
        fetch_timeout: Duration::from_secs(args.timeout_secs),
        max_in_flight: args.max_in_flight,
    });

    // Ctrl-C cancels between collection and write, leaving the tables at
    // their pre-run state.
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    match args.target {
        RefreshTarget::Volumes => {
            let report = runner.refresh_volume_paths(&ctx, &cancel).await?;
            print_report(&report, config)?;
        }
        RefreshTarget::Stages => {
            let report = runner.refresh_stage_paths(&ctx, &cancel).await?;
            print_report(&report, config)?;
        }
        RefreshTarget::All => {
            let (volumes, stages) = runner.refresh_all(&ctx, &cancel).await;
            let mut failures = Vec::new();
            for outcome in [volumes, stages] {
                match outcome {
                    Ok(report) => print_report(&report, config)?,
                    Err(err) => {
                        eprintln!("{} {err}", "refresh failed:".red());
                        failures.push(err);
                    }
                }
            }
            if let Some(err) = failures.into_iter().next() {
                return Err(err.into());
            }
        }
    }

    Ok(())
}

fn print_report(report: &RunReport, config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text | OutputFormat::Table => {
            let status = if report.is_partial() {
                "PARTIAL".yellow().to_string()
            } else {
                "OK".green().to_string()
            };
            println!(
                "{} {} v{} ({} entities, {} rows)",
                status,
                report.table.table_name(),
                report.table_version,
                report.entities_processed,
                report.rows_written
            );
            for skip in &report.skipped {
                println!(
                    "  {} {} during {}: {}",
                    "skipped".red(),
                    skip.entity,
                    skip.step,
                    skip.message
                );
            }
        }
    }
    Ok(())
}
