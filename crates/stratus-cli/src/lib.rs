//! # stratus-cli
//!
//! Command-line interface for the Stratus storage-location catalog.
//!
//! ## Commands
//!
//! - `stratus init` - Create the catalog tables (one-time setup)
//! - `stratus refresh` - Rebuild the catalog tables from the platform
//! - `stratus show` - Query a catalog table
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `STRATUS_GATEWAY_URL` - Platform gateway endpoint (default: `http://localhost:8080`)
//! - `STRATUS_TOKEN` - Gateway authentication token
//! - `STRATUS_ROLE` - Role to execute registry calls under
//! - `STRATUS_WAREHOUSE` - Warehouse to bind for statement execution
//! - `STRATUS_STORE_URL` - Catalog store location (default: `file://.stratus`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use clap::{Parser, Subcommand};

/// Stratus CLI - storage-location catalog tooling.
#[derive(Debug, Parser)]
#[command(name = "stratus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Platform gateway URL.
    #[arg(long, env = "STRATUS_GATEWAY_URL", default_value = "http://localhost:8080")]
    pub gateway_url: String,

    /// Gateway authentication token.
    #[arg(long, env = "STRATUS_TOKEN")]
    pub token: Option<String>,

    /// Role registry calls execute under.
    #[arg(long, env = "STRATUS_ROLE", default_value = "CATALOG_ADMIN")]
    pub role: String,

    /// Warehouse to bind for statement execution.
    #[arg(long, env = "STRATUS_WAREHOUSE")]
    pub warehouse: Option<String>,

    /// Catalog store URL (`file://...` or `mem://`).
    #[arg(long, env = "STRATUS_STORE_URL", default_value = "file://.stratus")]
    pub store_url: String,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            gateway_url: self.gateway_url.clone(),
            token: self.token.clone(),
            role: self.role.clone(),
            warehouse: self.warehouse.clone(),
            store_url: self.store_url.clone(),
            format: self.format.clone(),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the catalog tables (one-time setup).
    Init(commands::init::InitArgs),
    /// Rebuild the catalog tables from the platform registries.
    Refresh(commands::refresh::RefreshArgs),
    /// Query a catalog table.
    Show(commands::show::ShowArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform gateway URL.
    pub gateway_url: String,
    /// Gateway authentication token.
    pub token: Option<String>,
    /// Role registry calls execute under.
    pub role: String,
    /// Warehouse to bind for statement execution.
    pub warehouse: Option<String>,
    /// Catalog store URL.
    pub store_url: String,
    /// Output format.
    pub format: OutputFormat,
}
