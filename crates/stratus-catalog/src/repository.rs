//! Catalog table persistence.
//!
//! Each table is stored as an immutable row snapshot plus a small manifest
//! pointing at the current snapshot. A refresh writes the new snapshot
//! first and then swaps the manifest pointer with a version-matched write,
//! so a reader sees the previous table or the new one, never a partial
//! insert. The two table kinds are fully independent: distinct manifests,
//! distinct snapshot prefixes, distinct locks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use stratus_core::storage::{StorageBackend, WritePrecondition, WriteResult};
use stratus_core::Error;

use crate::error::{CatalogError, Result};
use crate::flatten::VolumePathRow;
use crate::lock::{RefreshLock, DEFAULT_LOCK_TTL, DEFAULT_MAX_ATTEMPTS};
use crate::stage::StagePathRow;

/// The two catalog tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// `EXTERNAL_VOLUME_PATHS(VOLUME_NAME, STORAGE_REGION, S3_PATH)`.
    VolumePaths,
    /// `STAGE_PATHS(STAGE_NAME, DATABASE_NAME, SCHEMA_NAME,
    /// STORAGE_REGION, STORAGE_PROVIDER, STAGE_URL)`.
    StagePaths,
}

impl TableKind {
    /// Both table kinds, in setup order.
    pub const ALL: [Self; 2] = [Self::VolumePaths, Self::StagePaths];

    /// The relation name consumers query.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Self::VolumePaths => "EXTERNAL_VOLUME_PATHS",
            Self::StagePaths => "STAGE_PATHS",
        }
    }

    /// Store path segment for this table's objects.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::VolumePaths => "volume_paths",
            Self::StagePaths => "stage_paths",
        }
    }

    fn manifest_path(self) -> String {
        format!("catalog/{}/manifest.json", self.slug())
    }

    fn snapshot_path(self) -> String {
        format!("catalog/{}/snapshots/{}.json", self.slug(), Ulid::new())
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Pointer to a table's current snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableManifest {
    /// Monotonic refresh counter; 0 until the first refresh.
    pub version: u64,

    /// Current snapshot object, absent before the first refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,

    /// Rows in the current snapshot.
    pub row_count: usize,

    /// When the table was last refreshed (or initialized).
    pub refreshed_at: DateTime<Utc>,
}

impl TableManifest {
    fn empty() -> Self {
        Self {
            version: 0,
            snapshot_path: None,
            row_count: 0,
            refreshed_at: Utc::now(),
        }
    }
}

/// Owns the two persisted catalog tables.
pub struct StorageCatalogRepository {
    store: Arc<dyn StorageBackend>,
    lock_ttl: Duration,
    lock_max_attempts: u32,
}

impl StorageCatalogRepository {
    /// Creates a repository over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self {
            store,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the refresh-lock acquisition policy.
    #[must_use]
    pub const fn with_lock_policy(mut self, ttl: Duration, max_attempts: u32) -> Self {
        self.lock_ttl = ttl;
        self.lock_max_attempts = max_attempts;
        self
    }

    /// Creates both table manifests if absent (idempotent setup step).
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn initialize(&self) -> Result<()> {
        for kind in TableKind::ALL {
            let payload = encode(&TableManifest::empty())?;
            match self
                .store
                .put(&kind.manifest_path(), payload, WritePrecondition::DoesNotExist)
                .await
                .map_err(CatalogError::Core)?
            {
                WriteResult::Success { .. } => {
                    tracing::info!(table = %kind, "catalog table created");
                }
                WriteResult::PreconditionFailed { .. } => {
                    tracing::debug!(table = %kind, "catalog table already exists");
                }
            }
        }
        Ok(())
    }

    /// Replaces the volume-paths table with the given rows.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::LockHeld`] if another refresh of this table
    /// is in progress, or [`CatalogError::RepositoryWrite`] if the swap
    /// could not complete (the table is left unchanged).
    pub async fn refresh_volume_paths(&self, rows: &[VolumePathRow]) -> Result<TableManifest> {
        self.refresh_table(TableKind::VolumePaths, rows).await
    }

    /// Replaces the stage-paths table with the given rows.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::refresh_volume_paths`].
    pub async fn refresh_stage_paths(&self, rows: &[StagePathRow]) -> Result<TableManifest> {
        self.refresh_table(TableKind::StagePaths, rows).await
    }

    /// Reads the volume-paths table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table was never initialized or the store
    /// fails.
    pub async fn volume_paths(&self) -> Result<Vec<VolumePathRow>> {
        self.read_rows(TableKind::VolumePaths).await
    }

    /// Reads the stage-paths table.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::volume_paths`].
    pub async fn stage_paths(&self) -> Result<Vec<StagePathRow>> {
        self.read_rows(TableKind::StagePaths).await
    }

    /// Reads a table's manifest (freshness metadata).
    ///
    /// # Errors
    ///
    /// Returns an error if the table was never initialized or the store
    /// fails.
    pub async fn manifest(&self, kind: TableKind) -> Result<TableManifest> {
        Ok(self.read_manifest(kind).await?.0)
    }

    async fn refresh_table<T: Serialize>(
        &self,
        kind: TableKind,
        rows: &[T],
    ) -> Result<TableManifest> {
        let lock = RefreshLock::for_table(Arc::clone(&self.store), kind);
        let guard = lock.acquire(self.lock_ttl, self.lock_max_attempts).await?;

        let result = self.swap_snapshot(kind, rows).await;
        let release = guard.release().await;

        let manifest = result?;
        release?;
        Ok(manifest)
    }

    async fn swap_snapshot<T: Serialize>(
        &self,
        kind: TableKind,
        rows: &[T],
    ) -> Result<TableManifest> {
        let (current, manifest_version) = self.read_manifest(kind).await?;

        let snapshot_path = kind.snapshot_path();
        let payload = encode(&rows)?;
        match self
            .store
            .put(&snapshot_path, payload, WritePrecondition::DoesNotExist)
            .await
            .map_err(|e| write_failure(kind, &e.to_string()))?
        {
            WriteResult::Success { .. } => {}
            WriteResult::PreconditionFailed { .. } => {
                return Err(write_failure(kind, "snapshot path collision"));
            }
        }

        let next = TableManifest {
            version: current.version + 1,
            snapshot_path: Some(snapshot_path.clone()),
            row_count: rows.len(),
            refreshed_at: Utc::now(),
        };
        let manifest_payload = encode(&next)?;

        let swap = self
            .store
            .put(
                &kind.manifest_path(),
                manifest_payload,
                WritePrecondition::MatchesVersion(manifest_version),
            )
            .await;
        match swap {
            Ok(WriteResult::Success { .. }) => {}
            Ok(WriteResult::PreconditionFailed { .. }) => {
                self.discard_snapshot(&snapshot_path).await;
                return Err(write_failure(kind, "manifest changed during refresh"));
            }
            Err(e) => {
                self.discard_snapshot(&snapshot_path).await;
                return Err(write_failure(kind, &e.to_string()));
            }
        }

        if let Some(previous) = &current.snapshot_path {
            self.discard_snapshot(previous).await;
        }

        tracing::info!(
            table = %kind,
            version = next.version,
            rows = next.row_count,
            "table refreshed"
        );
        Ok(next)
    }

    async fn discard_snapshot(&self, path: &str) {
        if let Err(e) = self.store.delete(path).await {
            tracing::warn!(path, error = %e, "failed to remove stale snapshot");
        }
    }

    async fn read_manifest(&self, kind: TableKind) -> Result<(TableManifest, String)> {
        let path = kind.manifest_path();
        let data = match self.store.get(&path).await {
            Ok(data) => data,
            Err(Error::NotFound(_)) => {
                return Err(CatalogError::Core(Error::NotFound(format!(
                    "table {kind} is not initialized; run setup first"
                ))));
            }
            Err(e) => return Err(e.into()),
        };
        let manifest: TableManifest = decode(&data)?;
        let meta = self
            .store
            .head(&path)
            .await
            .map_err(CatalogError::Core)?
            .ok_or_else(|| CatalogError::Core(Error::NotFound(path)))?;
        Ok((manifest, meta.version))
    }

    async fn read_rows<T: DeserializeOwned>(&self, kind: TableKind) -> Result<Vec<T>> {
        // A refresh may retire the snapshot we are about to read; one
        // manifest re-read is enough, since the new pointer is durable by
        // the time the old snapshot is discarded.
        for _ in 0..2 {
            let (manifest, _) = self.read_manifest(kind).await?;
            let Some(snapshot_path) = manifest.snapshot_path else {
                return Ok(Vec::new());
            };
            match self.store.get(&snapshot_path).await {
                Ok(data) => return decode(&data),
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CatalogError::Core(Error::storage(format!(
            "snapshot for {kind} kept disappearing mid-read"
        ))))
    }
}

fn write_failure(kind: TableKind, message: &str) -> CatalogError {
    CatalogError::RepositoryWrite {
        table: kind,
        message: message.to_string(),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| CatalogError::Core(Error::serialization(e.to_string())))
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data)
        .map_err(|e| CatalogError::Core(Error::serialization(e.to_string())))
}
