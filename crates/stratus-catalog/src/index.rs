//! In-memory volume index.
//!
//! The index is the intermediate tree between descriptor collection and
//! flattening: volume name → region → ordered list of storage locations.
//! Iteration order is contractual: volumes, regions, and paths all come
//! back in insertion order, which is what makes the downstream flattening
//! deterministic. The structure is Vec-backed rather than hashed for that
//! reason.

use crate::volume::VolumeProperty;

/// Nested mapping of volume → region → storage locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeIndex {
    volumes: Vec<VolumeEntry>,
}

/// One volume's region map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeEntry {
    name: String,
    regions: Vec<RegionEntry>,
}

/// One region's ordered storage locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    region: String,
    paths: Vec<String>,
}

impl VolumeIndex {
    /// Ensures a volume entry exists, without adding any regions.
    ///
    /// A volume whose descriptor matched nothing still occupies a slot in
    /// the index; flattening emits no rows for it.
    pub fn ensure_volume(&mut self, volume: &str) {
        self.entry(volume);
    }

    /// Appends paths under `index[volume][region]`.
    ///
    /// A repeated (volume, region) key concatenates in encounter order.
    /// Nothing is deduplicated or sorted: the platform allows multiple
    /// storage-location entries per region and repeated paths upstream are
    /// preserved as-is.
    pub fn insert(&mut self, volume: &str, region: &str, paths: &[String]) {
        let entry = self.entry(volume);
        match entry.regions.iter_mut().find(|r| r.region == region) {
            Some(existing) => existing.paths.extend_from_slice(paths),
            None => entry.regions.push(RegionEntry {
                region: region.to_string(),
                paths: paths.to_vec(),
            }),
        }
    }

    fn entry(&mut self, volume: &str) -> &mut VolumeEntry {
        let position = match self.volumes.iter().position(|v| v.name == volume) {
            Some(position) => position,
            None => {
                self.volumes.push(VolumeEntry {
                    name: volume.to_string(),
                    regions: Vec::new(),
                });
                self.volumes.len() - 1
            }
        };
        &mut self.volumes[position]
    }

    /// Iterates volumes in insertion order.
    pub fn volumes(&self) -> impl Iterator<Item = &VolumeEntry> {
        self.volumes.iter()
    }

    /// Number of volumes present (including empty ones).
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// Returns true if no volumes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Paths recorded for a (volume, region) pair, if any.
    #[must_use]
    pub fn paths(&self, volume: &str, region: &str) -> Option<&[String]> {
        self.volumes
            .iter()
            .find(|v| v.name == volume)?
            .regions
            .iter()
            .find(|r| r.region == region)
            .map(|r| r.paths.as_slice())
    }
}

impl VolumeEntry {
    /// Volume name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterates regions in insertion order.
    pub fn regions(&self) -> impl Iterator<Item = &RegionEntry> {
        self.regions.iter()
    }
}

impl RegionEntry {
    /// Region name.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Storage locations in encounter order.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// Folds per-volume properties into a [`VolumeIndex`].
#[derive(Debug, Default)]
pub struct VolumeIndexBuilder {
    index: VolumeIndex,
}

impl VolumeIndexBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one volume's filtered properties into the index.
    ///
    /// The volume appears in the index even when `properties` is empty.
    /// An entry with no allowed locations contributes no paths.
    pub fn add_volume(&mut self, volume: &str, properties: &[VolumeProperty]) {
        self.index.ensure_volume(volume);
        for property in properties {
            self.index
                .insert(volume, &property.region, &property.allowed_locations);
        }
    }

    /// Consumes the builder, returning the finished index.
    #[must_use]
    pub fn finish(self) -> VolumeIndex {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(region: &str, locations: &[&str]) -> VolumeProperty {
        VolumeProperty {
            property_name: "STORAGE_LOCATION_1".into(),
            storage_provider: "S3".into(),
            sub_volume_name: "loc".into(),
            region: region.into(),
            allowed_locations: locations.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn repeated_region_concatenates_in_encounter_order() {
        let mut index = VolumeIndex::default();
        index.insert("V1", "us-east-1", &["s3://b/p1".into()]);
        index.insert("V1", "us-east-1", &["s3://b/p2".into(), "s3://b/p3".into()]);

        assert_eq!(
            index.paths("V1", "us-east-1").expect("present"),
            ["s3://b/p1", "s3://b/p2", "s3://b/p3"]
        );
    }

    #[test]
    fn duplicates_are_preserved() {
        let mut index = VolumeIndex::default();
        index.insert("V1", "us-east-1", &["s3://b/p".into()]);
        index.insert("V1", "us-east-1", &["s3://b/p".into()]);

        assert_eq!(index.paths("V1", "us-east-1").expect("present").len(), 2);
    }

    #[test]
    fn volume_and_region_insertion_order_preserved() {
        let mut index = VolumeIndex::default();
        index.insert("ZULU", "eu-west-1", &["s3://z/1".into()]);
        index.insert("ALPHA", "us-east-1", &["s3://a/1".into()]);
        index.insert("ZULU", "ap-south-1", &["s3://z/2".into()]);

        let names: Vec<_> = index.volumes().map(VolumeEntry::name).collect();
        assert_eq!(names, ["ZULU", "ALPHA"]);

        let zulu_regions: Vec<_> = index
            .volumes()
            .next()
            .expect("zulu")
            .regions()
            .map(RegionEntry::region)
            .collect();
        assert_eq!(zulu_regions, ["eu-west-1", "ap-south-1"]);
    }

    #[test]
    fn builder_keeps_empty_volume() {
        let mut builder = VolumeIndexBuilder::new();
        builder.add_volume("EMPTY_VOL", &[]);
        let index = builder.finish();

        assert_eq!(index.volume_count(), 1);
        assert!(index.volumes().next().expect("entry").regions().count() == 0);
    }

    #[test]
    fn empty_allowed_locations_contribute_no_paths() {
        let mut builder = VolumeIndexBuilder::new();
        builder.add_volume("V1", &[property("us-east-1", &[])]);
        let index = builder.finish();

        assert_eq!(index.paths("V1", "us-east-1").expect("present").len(), 0);
    }
}
