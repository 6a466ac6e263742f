//! Init command - create the catalog tables.

use anyhow::Result;
use clap::Args;

use stratus_catalog::TableKind;

use crate::{Config, OutputFormat};

/// Arguments for the init command.
#[derive(Debug, Args)]
pub struct InitArgs {}

/// Execute the init command.
///
/// Idempotent: existing tables are left untouched.
///
/// # Errors
///
/// Returns an error if the catalog store cannot be opened or written.
pub async fn execute(_args: &InitArgs, config: &Config) -> Result<()> {
    let repository = super::repository(config)?;
    repository.initialize().await?;

    match config.format {
        OutputFormat::Json => {
            let manifests = [
                repository.manifest(TableKind::VolumePaths).await?,
                repository.manifest(TableKind::StagePaths).await?,
            ];
            println!("{}", serde_json::to_string_pretty(&manifests)?);
        }
        OutputFormat::Text | OutputFormat::Table => {
            for kind in TableKind::ALL {
                let manifest = repository.manifest(kind).await?;
                println!(
                    "{} ready (version {}, {} rows)",
                    kind.table_name(),
                    manifest.version,
                    manifest.row_count
                );
            }
        }
    }

    Ok(())
}
