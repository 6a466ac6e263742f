//! Stage descriptor collection.
//!
//! Stages arrive as flat records from a single account-scope enumeration,
//! so collection here is one call, a type filter, and a total projection:
//! a stage missing an optional field yields a row with that field empty,
//! never a dropped record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use stratus_core::registry::{MetadataRegistry, StageListing};
use stratus_core::{Error, PlatformContext, Result};

use crate::volume::CollectorConfig;

/// Stage type discriminator for externally-backed stages.
pub const EXTERNAL_STAGE_TYPE: &str = "EXTERNAL";

/// One persisted row of the `STAGE_PATHS` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StagePathRow {
    /// Stage name.
    pub stage_name: String,

    /// Database owning the stage.
    pub database_name: String,

    /// Schema owning the stage.
    pub schema_name: String,

    /// Storage region, or empty if the platform reported none.
    pub storage_region: String,

    /// Storage provider, or empty if the platform reported none.
    pub storage_provider: String,

    /// Storage URL, or empty if the platform reported none.
    pub stage_url: String,
}

impl StagePathRow {
    /// Projects an enumeration row into a catalog row.
    #[must_use]
    pub fn from_listing(listing: StageListing) -> Self {
        Self {
            stage_name: listing.name,
            database_name: listing.database_name,
            schema_name: listing.schema_name,
            storage_region: listing.region.unwrap_or_default(),
            storage_provider: listing.cloud.unwrap_or_default(),
            stage_url: listing.url.unwrap_or_default(),
        }
    }
}

/// Collects externally-backed stages across the account scope.
pub struct StageDescriptorCollector<R: MetadataRegistry + ?Sized> {
    registry: Arc<R>,
    config: CollectorConfig,
}

impl<R: MetadataRegistry + ?Sized> StageDescriptorCollector<R> {
    /// Creates a collector over the given registry.
    #[must_use]
    pub fn new(registry: Arc<R>, config: CollectorConfig) -> Self {
        Self { registry, config }
    }

    /// Enumerates stages and projects the external ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the enumeration fails or times out.
    pub async fn collect(&self, ctx: &PlatformContext) -> Result<Vec<StagePathRow>> {
        let listings = timeout(self.config.fetch_timeout, self.registry.list_stages(ctx))
            .await
            .map_err(|_| {
                Error::upstream(
                    "account",
                    format!(
                        "stage enumeration timed out after {}s",
                        self.config.fetch_timeout.as_secs()
                    ),
                )
            })??;

        Ok(listings
            .into_iter()
            .filter(|listing| listing.stage_type == EXTERNAL_STAGE_TYPE)
            .map(StagePathRow::from_listing)
            .collect())
    }
}
