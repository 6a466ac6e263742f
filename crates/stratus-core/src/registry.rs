//! Metadata registry abstraction for the data platform.
//!
//! The platform's volume and stage registries are external collaborators:
//! this module defines the contract Stratus consumes them through, plus an
//! in-memory implementation for tests. The wire rows mirror what the
//! platform's enumeration and descriptor commands return; Stratus never
//! reimplements those commands, it only consumes their result shape.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::PlatformContext;
use crate::error::{Error, Result};

/// One row from the volume enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSummary {
    /// Registered volume name.
    pub name: String,
}

/// One row of a volume's raw property descriptor.
///
/// `property_value` is an opaque string; for storage-location properties it
/// holds a JSON object which the pipeline parses downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRow {
    /// Grouping key for the property (e.g. `STORAGE_LOCATIONS`).
    #[serde(default)]
    pub parent_property: String,

    /// Property key (e.g. `STORAGE_LOCATION_1`, or the `ACTIVE` marker).
    pub property: String,

    /// Declared type of the property value.
    #[serde(default)]
    pub property_type: String,

    /// Raw property value as returned by the platform.
    #[serde(default)]
    pub property_value: String,
}

/// One row from the account-scope stage enumeration.
///
/// Optional fields are reported inconsistently by the platform depending
/// on stage type and cloud; absent fields deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageListing {
    /// Stage name.
    pub name: String,

    /// Database owning the stage.
    #[serde(default)]
    pub database_name: String,

    /// Schema owning the stage.
    #[serde(default)]
    pub schema_name: String,

    /// Storage region, if reported.
    #[serde(default)]
    pub region: Option<String>,

    /// Cloud provider, if reported.
    #[serde(default)]
    pub cloud: Option<String>,

    /// Storage URL, if reported.
    #[serde(default)]
    pub url: Option<String>,

    /// Stage type discriminator (`EXTERNAL` or `INTERNAL`).
    #[serde(rename = "type", default)]
    pub stage_type: String,
}

/// Read access to the platform's volume and stage registries.
///
/// All calls are blocking I/O from the platform's perspective; callers are
/// expected to apply their own timeouts and treat a timeout as a failure
/// of the entity being fetched, not of the whole run.
#[async_trait]
pub trait MetadataRegistry: Send + Sync + 'static {
    /// Enumerates registered external volumes.
    async fn list_volumes(&self, ctx: &PlatformContext) -> Result<Vec<VolumeSummary>>;

    /// Fetches the raw property descriptor for one volume.
    async fn describe_volume(
        &self,
        ctx: &PlatformContext,
        volume: &str,
    ) -> Result<Vec<DescriptorRow>>;

    /// Enumerates stages across the account scope.
    async fn list_stages(&self, ctx: &PlatformContext) -> Result<Vec<StageListing>>;
}

/// In-memory registry for tests.
///
/// Volumes are returned in registration order. Individual descriptor
/// fetches can be made to fail, simulating transient or permission errors
/// on a single volume while the rest of the enumeration succeeds.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    volumes: Vec<String>,
    descriptors: HashMap<String, Vec<DescriptorRow>>,
    stages: Vec<StageListing>,
    failing_volumes: HashSet<String>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a volume with its descriptor rows.
    #[must_use]
    pub fn with_volume(mut self, name: impl Into<String>, rows: Vec<DescriptorRow>) -> Self {
        let name = name.into();
        self.volumes.push(name.clone());
        self.descriptors.insert(name, rows);
        self
    }

    /// Registers a stage listing row.
    #[must_use]
    pub fn with_stage(mut self, stage: StageListing) -> Self {
        self.stages.push(stage);
        self
    }

    /// Marks a volume so its descriptor fetch fails.
    #[must_use]
    pub fn with_failing_volume(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.volumes.push(name.clone());
        self.failing_volumes.insert(name);
        self
    }
}

#[async_trait]
impl MetadataRegistry for MemoryRegistry {
    async fn list_volumes(&self, _ctx: &PlatformContext) -> Result<Vec<VolumeSummary>> {
        Ok(self
            .volumes
            .iter()
            .map(|name| VolumeSummary { name: name.clone() })
            .collect())
    }

    async fn describe_volume(
        &self,
        _ctx: &PlatformContext,
        volume: &str,
    ) -> Result<Vec<DescriptorRow>> {
        if self.failing_volumes.contains(volume) {
            return Err(Error::upstream(volume, "descriptor fetch refused"));
        }

        self.descriptors
            .get(volume)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("volume not registered: {volume}")))
    }

    async fn list_stages(&self, _ctx: &PlatformContext) -> Result<Vec<StageListing>> {
        Ok(self.stages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PlatformContext {
        PlatformContext::new("CATALOG_ADMIN").expect("valid role")
    }

    fn location_row(key: &str, value: &str) -> DescriptorRow {
        DescriptorRow {
            parent_property: "STORAGE_LOCATIONS".into(),
            property: key.into(),
            property_type: "String".into(),
            property_value: value.into(),
        }
    }

    #[tokio::test]
    async fn volumes_listed_in_registration_order() {
        let registry = MemoryRegistry::new()
            .with_volume("VOL_B", vec![])
            .with_volume("VOL_A", vec![]);

        let names: Vec<_> = registry
            .list_volumes(&ctx())
            .await
            .expect("list")
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, ["VOL_B", "VOL_A"]);
    }

    #[tokio::test]
    async fn failing_volume_errors_without_affecting_others() {
        let registry = MemoryRegistry::new()
            .with_volume("GOOD", vec![location_row("STORAGE_LOCATION_1", "{}")])
            .with_failing_volume("BAD");

        assert!(registry.describe_volume(&ctx(), "GOOD").await.is_ok());
        let err = registry
            .describe_volume(&ctx(), "BAD")
            .await
            .expect_err("should fail");
        assert!(err.is_entity_scoped());
    }

    #[test]
    fn stage_listing_tolerates_missing_optional_fields() {
        let listing: StageListing = serde_json::from_str(
            r#"{"name": "RAW_STAGE", "type": "EXTERNAL"}"#,
        )
        .expect("parse");

        assert_eq!(listing.name, "RAW_STAGE");
        assert_eq!(listing.stage_type, "EXTERNAL");
        assert_eq!(listing.region, None);
        assert_eq!(listing.url, None);
        assert_eq!(listing.database_name, "");
    }
}
