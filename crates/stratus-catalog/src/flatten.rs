//! Index flattening.
//!
//! Unrolls the three-level volume index into flat catalog rows, one per
//! leaf path. The unroll is a separate pass from index building so both
//! stages stay independently testable.

use serde::{Deserialize, Serialize};

use crate::index::VolumeIndex;

/// One persisted row of the `EXTERNAL_VOLUME_PATHS` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct VolumePathRow {
    /// Volume the path belongs to.
    pub volume_name: String,

    /// Region the path is served from.
    pub storage_region: String,

    /// Concrete storage location.
    pub s3_path: String,
}

/// Unrolls the index into rows: volumes, then regions, then paths, all in
/// insertion order. A (volume, region) pair with no paths emits nothing.
#[must_use]
pub fn flatten(index: &VolumeIndex) -> Vec<VolumePathRow> {
    let mut rows = Vec::new();
    for volume in index.volumes() {
        for region in volume.regions() {
            for path in region.paths() {
                rows.push(VolumePathRow {
                    volume_name: volume.name().to_string(),
                    storage_region: region.region().to_string(),
                    s3_path: path.clone(),
                });
            }
        }
    }
    rows
}

/// Strips the trailing wildcard and slash decoration from a storage
/// location, yielding the comparable prefix form.
///
/// Registered locations often end in `/` or `/*`; consumers joining a
/// table's base location against the catalog match on the trimmed form.
#[must_use]
pub fn trim_location_suffix(location: &str) -> &str {
    location.trim_end_matches(|c| c == '/' || c == '*')
}
