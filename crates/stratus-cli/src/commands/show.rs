//! Show command - query a catalog table.

use anyhow::Result;
use clap::Args;

use stratus_catalog::{trim_location_suffix, TableKind};

use crate::{Config, OutputFormat};

/// Arguments for the show command.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Table to query.
    #[arg(value_enum)]
    pub table: TableArg,

    /// Show the table's freshness metadata instead of its rows.
    #[arg(long)]
    pub manifest: bool,

    /// Trim trailing `/` and `*` from locations, the form used for
    /// prefix matching against a table's base location.
    #[arg(long)]
    pub normalize: bool,
}

/// Table selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TableArg {
    /// The `EXTERNAL_VOLUME_PATHS` table.
    VolumePaths,
    /// The `STAGE_PATHS` table.
    StagePaths,
}

impl From<TableArg> for TableKind {
    fn from(arg: TableArg) -> Self {
        match arg {
            TableArg::VolumePaths => Self::VolumePaths,
            TableArg::StagePaths => Self::StagePaths,
        }
    }
}

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the table was never
/// initialized.
pub async fn execute(args: &ShowArgs, config: &Config) -> Result<()> {
    let repository = super::repository(config)?;
    let kind = TableKind::from(args.table);

    if args.manifest {
        let manifest = repository.manifest(kind).await?;
        match config.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&manifest)?),
            OutputFormat::Text | OutputFormat::Table => {
                println!("Table: {}", kind.table_name());
                println!("Version: {}", manifest.version);
                println!("Rows: {}", manifest.row_count);
                println!("Refreshed: {}", manifest.refreshed_at);
            }
        }
        return Ok(());
    }

    match kind {
        TableKind::VolumePaths => show_volume_paths(&repository, args, config).await,
        TableKind::StagePaths => show_stage_paths(&repository, args, config).await,
    }
}

async fn show_volume_paths(
    repository: &stratus_catalog::StorageCatalogRepository,
    args: &ShowArgs,
    config: &Config,
) -> Result<()> {
    let mut rows = repository.volume_paths().await?;
    if args.normalize {
        for row in &mut rows {
            row.s3_path = trim_location_suffix(&row.s3_path).to_string();
        }
    }

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No volume paths recorded");
                return Ok(());
            }
            for row in &rows {
                println!(
                    "{}  {}  {}",
                    row.volume_name, row.storage_region, row.s3_path
                );
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct DisplayRow {
                #[tabled(rename = "Volume")]
                volume: String,
                #[tabled(rename = "Region")]
                region: String,
                #[tabled(rename = "Path")]
                path: String,
            }

            let display: Vec<_> = rows
                .iter()
                .map(|r| DisplayRow {
                    volume: r.volume_name.clone(),
                    region: r.storage_region.clone(),
                    path: r.s3_path.clone(),
                })
                .collect();

            if display.is_empty() {
                println!("No volume paths recorded");
            } else {
                println!("{}", Table::new(display));
            }
        }
    }

    Ok(())
}

async fn show_stage_paths(
    repository: &stratus_catalog::StorageCatalogRepository,
    args: &ShowArgs,
    config: &Config,
) -> Result<()> {
    let mut rows = repository.stage_paths().await?;
    if args.normalize {
        for row in &mut rows {
            row.stage_url = trim_location_suffix(&row.stage_url).to_string();
        }
    }

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No stage paths recorded");
                return Ok(());
            }
            for row in &rows {
                println!(
                    "{}.{}.{}  {}  {}",
                    row.database_name, row.schema_name, row.stage_name, row.storage_region,
                    row.stage_url
                );
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct DisplayRow {
                #[tabled(rename = "Stage")]
                stage: String,
                #[tabled(rename = "Database")]
                database: String,
                #[tabled(rename = "Schema")]
                schema: String,
                #[tabled(rename = "Region")]
                region: String,
                #[tabled(rename = "Provider")]
                provider: String,
                #[tabled(rename = "URL")]
                url: String,
            }

            let display: Vec<_> = rows
                .iter()
                .map(|r| DisplayRow {
                    stage: r.stage_name.clone(),
                    database: r.database_name.clone(),
                    schema: r.schema_name.clone(),
                    region: r.storage_region.clone(),
                    provider: r.storage_provider.clone(),
                    url: r.stage_url.clone(),
                })
                .collect();

            if display.is_empty() {
                println!("No stage paths recorded");
            } else {
                println!("{}", Table::new(display));
            }
        }
    }

    Ok(())
}
