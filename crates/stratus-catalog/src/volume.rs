//! Volume descriptor collection.
//!
//! An external volume's descriptor is a semi-structured property bag: each
//! row carries a property key and an opaque value, and the storage-location
//! rows hold a JSON payload describing one (region, allowed-locations)
//! binding. This module fetches descriptors for every registered volume,
//! parses the payloads, and filters them to the target storage provider,
//! surfacing per-volume failures without aborting the enumeration.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;

use stratus_core::registry::{DescriptorRow, MetadataRegistry};
use stratus_core::{Error, PlatformContext, Result};

/// Administrative marker property; never a storage location.
pub const ACTIVE_MARKER: &str = "ACTIVE";

/// Configuration for descriptor collection.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Storage provider class to retain (e.g. `S3`).
    pub provider: String,

    /// Timeout applied to each registry call.
    pub fetch_timeout: Duration,

    /// Maximum number of descriptor fetches in flight at once.
    pub max_in_flight: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            provider: "S3".into(),
            fetch_timeout: Duration::from_secs(30),
            max_in_flight: 8,
        }
    }
}

/// JSON payload of one storage-location property.
///
/// Keys are uppercase as the platform emits them.
#[derive(Debug, Clone, Deserialize)]
struct StorageLocationPayload {
    #[serde(rename = "NAME", default)]
    name: String,

    #[serde(rename = "STORAGE_PROVIDER", default)]
    storage_provider: String,

    #[serde(rename = "STORAGE_REGION", default)]
    storage_region: String,

    #[serde(rename = "STORAGE_ALLOWED_LOCATIONS", default)]
    storage_allowed_locations: Vec<String>,
}

/// One parsed, provider-matched entry from a volume's descriptor.
///
/// Ephemeral: exists only between collection and index building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeProperty {
    /// Descriptor property key (e.g. `STORAGE_LOCATION_1`).
    pub property_name: String,

    /// Storage provider reported by the payload.
    pub storage_provider: String,

    /// Sub-volume name reported by the payload.
    pub sub_volume_name: String,

    /// Storage region this entry binds.
    pub region: String,

    /// Storage locations allowed under this entry, in descriptor order.
    pub allowed_locations: Vec<String>,
}

/// Collection outcome for one volume.
#[derive(Debug)]
pub enum CollectionOutcome {
    /// Descriptor fetched and parsed; properties filtered to the target
    /// provider. May be empty: a volume with no matching properties still
    /// appears here rather than being silently dropped.
    Collected(Vec<VolumeProperty>),

    /// The fetch or parse failed for this volume only.
    Failed(Error),
}

/// Per-volume result of a collection pass.
#[derive(Debug)]
pub struct VolumeCollection {
    /// Volume name as registered.
    pub volume: String,

    /// What happened for this volume.
    pub outcome: CollectionOutcome,
}

/// Collects and filters raw volume descriptors.
pub struct VolumeDescriptorCollector<R: MetadataRegistry + ?Sized> {
    registry: Arc<R>,
    config: CollectorConfig,
}

impl<R: MetadataRegistry + ?Sized> VolumeDescriptorCollector<R> {
    /// Creates a collector over the given registry.
    #[must_use]
    pub fn new(registry: Arc<R>, config: CollectorConfig) -> Self {
        Self { registry, config }
    }

    /// Enumerates volumes and fetches each descriptor.
    ///
    /// Fetches fan out in bounded batches; results come back in
    /// enumeration order. A failed fetch or malformed descriptor is
    /// recorded in that volume's outcome, not raised.
    ///
    /// # Errors
    ///
    /// Returns an error only if the enumeration itself fails or times out.
    pub async fn collect(&self, ctx: &PlatformContext) -> Result<Vec<VolumeCollection>> {
        let volumes = timeout(self.config.fetch_timeout, self.registry.list_volumes(ctx))
            .await
            .map_err(|_| {
                Error::upstream(
                    "account",
                    format!(
                        "volume enumeration timed out after {}s",
                        self.config.fetch_timeout.as_secs()
                    ),
                )
            })??;

        let mut collections = Vec::with_capacity(volumes.len());
        for batch in volumes.chunks(self.config.max_in_flight.max(1)) {
            let handles: Vec<_> = batch
                .iter()
                .map(|summary| {
                    let registry = Arc::clone(&self.registry);
                    let ctx = ctx.clone();
                    let config = self.config.clone();
                    let volume = summary.name.clone();
                    tokio::spawn(async move { fetch_volume(&*registry, &ctx, &config, volume).await })
                })
                .collect();

            for handle in handles {
                collections.push(handle.await.map_err(|e| Error::Internal {
                    message: format!("descriptor fetch task failed: {e}"),
                })?);
            }
        }

        Ok(collections)
    }
}

/// Fetches and parses one volume's descriptor.
async fn fetch_volume<R: MetadataRegistry + ?Sized>(
    registry: &R,
    ctx: &PlatformContext,
    config: &CollectorConfig,
    volume: String,
) -> VolumeCollection {
    let rows = match timeout(config.fetch_timeout, registry.describe_volume(ctx, &volume)).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(err)) => {
            return VolumeCollection {
                volume,
                outcome: CollectionOutcome::Failed(err),
            };
        }
        Err(_) => {
            let err = Error::upstream(
                &volume,
                format!(
                    "descriptor fetch timed out after {}s",
                    config.fetch_timeout.as_secs()
                ),
            );
            return VolumeCollection {
                volume,
                outcome: CollectionOutcome::Failed(err),
            };
        }
    };

    let outcome = match parse_properties(&volume, &rows, &config.provider) {
        Ok(properties) => CollectionOutcome::Collected(properties),
        Err(err) => CollectionOutcome::Failed(err),
    };
    VolumeCollection { volume, outcome }
}

/// Parses descriptor rows, keeping provider-matched storage locations.
///
/// The `ACTIVE` marker is discarded before parsing; every other row must
/// carry a JSON payload, and a row that doesn't marks the whole volume's
/// descriptor malformed.
fn parse_properties(
    volume: &str,
    rows: &[DescriptorRow],
    provider: &str,
) -> Result<Vec<VolumeProperty>> {
    let mut properties = Vec::new();

    for row in rows {
        if row.property == ACTIVE_MARKER {
            continue;
        }

        let payload: StorageLocationPayload =
            serde_json::from_str(&row.property_value).map_err(|e| {
                Error::malformed(volume, format!("property {}: {e}", row.property))
            })?;

        if payload.storage_provider != provider {
            continue;
        }

        properties.push(VolumeProperty {
            property_name: row.property.clone(),
            storage_provider: payload.storage_provider,
            sub_volume_name: payload.name,
            region: payload.storage_region,
            allowed_locations: payload.storage_allowed_locations,
        });
    }

    Ok(properties)
}
