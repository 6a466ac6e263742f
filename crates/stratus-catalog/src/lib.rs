//! # stratus-catalog
//!
//! Storage-location discovery pipeline for the Stratus catalog.
//!
//! This crate normalizes the metadata the platform holds about external
//! volumes and external stages into two flat, exact-match-queryable
//! tables:
//!
//! - **Volume path**: descriptor collection → nested index → flattening →
//!   `EXTERNAL_VOLUME_PATHS`
//! - **Stage path**: account enumeration → projection → `STAGE_PATHS`
//!
//! The two pipelines are independent and may run concurrently; they share
//! nothing but the repository's two distinct tables.
//!
//! ## Storage Layout
//!
//! ```text
//! catalog/
//! ├── volume_paths/
//! │   ├── manifest.json        # Pointer to the current snapshot
//! │   └── snapshots/           # Immutable row snapshots
//! ├── stage_paths/
//! │   ├── manifest.json
//! │   └── snapshots/
//! locks/
//! ├── volume_paths.lock        # Per-table refresh locks
//! └── stage_paths.lock
//! ```
//!
//! A refresh writes the new snapshot first and swaps the manifest pointer
//! last, so readers always see a complete table.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod flatten;
pub mod index;
pub mod lock;
pub mod refresh;
pub mod repository;
pub mod stage;
pub mod volume;

// Re-export main types at crate root
pub use error::{CatalogError, Result};
pub use flatten::{flatten, trim_location_suffix, VolumePathRow};
pub use index::{VolumeIndex, VolumeIndexBuilder};
pub use lock::{RefreshClaim, RefreshGuard, RefreshLock};
pub use refresh::{FailureKind, RefreshRunner, RefreshStep, RunReport, SkippedEntity};
pub use repository::{StorageCatalogRepository, TableKind, TableManifest};
pub use stage::{StageDescriptorCollector, StagePathRow};
pub use volume::{
    CollectionOutcome, CollectorConfig, VolumeCollection, VolumeDescriptorCollector,
    VolumeProperty,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{CatalogError, Result};
    pub use crate::flatten::{flatten, VolumePathRow};
    pub use crate::index::{VolumeIndex, VolumeIndexBuilder};
    pub use crate::refresh::{RefreshRunner, RunReport};
    pub use crate::repository::{StorageCatalogRepository, TableKind};
    pub use crate::stage::{StageDescriptorCollector, StagePathRow};
    pub use crate::volume::{CollectorConfig, VolumeDescriptorCollector};
}
