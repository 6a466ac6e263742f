//! CLI subcommand implementations.

pub mod init;
pub mod refresh;
pub mod show;

use std::sync::Arc;

use anyhow::{Context, Result};

use stratus_catalog::StorageCatalogRepository;
use stratus_core::{HttpRegistry, ObjectStoreBackend, PlatformContext};

use crate::Config;

/// Opens the catalog repository named by the configuration.
pub(crate) fn repository(config: &Config) -> Result<Arc<StorageCatalogRepository>> {
    let backend = ObjectStoreBackend::from_url(&config.store_url)
        .with_context(|| format!("Failed to open catalog store at {}", config.store_url))?;
    Ok(Arc::new(StorageCatalogRepository::new(Arc::new(backend))))
}

/// Builds the gateway-backed registry client.
pub(crate) fn registry(config: &Config) -> Result<Arc<HttpRegistry>> {
    let registry = HttpRegistry::new(config.gateway_url.clone(), config.token.clone())
        .context("Failed to create gateway client")?;
    Ok(Arc::new(registry))
}

/// Builds the platform context registry calls execute under.
pub(crate) fn platform_context(config: &Config) -> Result<PlatformContext> {
    let mut ctx = PlatformContext::new(config.role.as_str())
        .with_context(|| format!("Invalid role: {}", config.role))?;
    if let Some(warehouse) = &config.warehouse {
        ctx = ctx.with_warehouse(warehouse.as_str());
    }
    Ok(ctx)
}
