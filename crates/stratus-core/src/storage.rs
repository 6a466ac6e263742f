//! Catalog store abstraction.
//!
//! The produced catalog tables are persisted as immutable snapshot objects
//! plus small manifest pointers, so the store contract is object-storage
//! shaped: whole-object reads and writes, with preconditions for the
//! compare-and-swap pointer updates that make a refresh atomic from a
//! reader's perspective.
//!
//! Version tokens are opaque strings. The in-memory backend uses numeric
//! counters; the `object_store`-backed one uses entity tags, so the same
//! CAS discipline works against local disk and cloud object stores.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload, UpdateVersion};

use crate::error::{Error, Result};

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the object does not exist.
    DoesNotExist,
    /// Write only if the object's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed; the object was not modified.
    PreconditionFailed {
        /// The version that caused the precondition to fail, if known.
        current_version: String,
    },
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Version token for CAS operations.
    pub version: String,
}

/// Storage contract for the catalog store.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object, honoring the precondition.
    ///
    /// A failed precondition is a normal result, never an error.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes an object. Idempotent: succeeds if the object is absent.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory storage backend for tests.
///
/// Thread-safe via `RwLock`; versions are monotonic counters per path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, VersionedObject>>>,
}

#[derive(Debug, Clone)]
struct VersionedObject {
    data: Bytes,
    version: u64,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> Error {
        Error::Internal {
            message: "storage lock poisoned".into(),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Self::lock_err())?;
        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| Self::lock_err())?;
        let current = objects.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(existing) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: existing.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => match current {
                Some(existing) if existing.version.to_string() != expected => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: existing.version.to_string(),
                    });
                }
                None => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: "0".into(),
                    });
                }
                _ => {}
            },
            WritePrecondition::None => {}
        }

        let version = current.map_or(1, |o| o.version + 1);
        objects.insert(path.to_string(), VersionedObject { data, version });
        drop(objects);

        Ok(WriteResult::Success {
            version: version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Self::lock_err())?
            .remove(path);
        Ok(())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Self::lock_err())?;
        Ok(objects.get(path).map(|o| ObjectMeta {
            path: path.to_string(),
            size: o.data.len() as u64,
            version: o.version.to_string(),
        }))
    }
}

// ============================================================================
// object_store backend
// ============================================================================

/// Storage backend built on the `object_store` crate.
///
/// Supports local filesystem roots (`file://` URLs or bare paths) and an
/// in-process store (`mem://`) with the same conditional-put semantics.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBackend").finish_non_exhaustive()
    }
}

impl ObjectStoreBackend {
    /// Wraps an existing `object_store` implementation.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Builds a backend from a store URL.
    ///
    /// `mem://` maps to an in-process store; `file:///path` and bare paths
    /// map to a local filesystem root, created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported URL schemes or if the local root
    /// cannot be created.
    pub fn from_url(url: &str) -> Result<Self> {
        if url == "mem://" || url == "memory://" {
            return Ok(Self::new(Arc::new(object_store::memory::InMemory::new())));
        }

        if let Some(rest) = url.split_once("://") {
            if rest.0 != "file" {
                return Err(Error::InvalidInput(format!(
                    "unsupported store URL scheme: {url}"
                )));
            }
            return Self::local(rest.1);
        }

        Self::local(url)
    }

    fn local(root: &str) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            Error::storage_with_source(format!("failed to create store root {root}"), e)
        })?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(root).map_err(|e| {
            Error::storage_with_source(format!("failed to open store root {root}"), e)
        })?;
        Ok(Self::new(Arc::new(store)))
    }

    fn store_path(path: &str) -> StorePath {
        StorePath::from(path)
    }

    async fn current_version(&self, path: &StorePath) -> String {
        match self.store.head(path).await {
            Ok(meta) => version_token(meta.e_tag, meta.version),
            Err(_) => "unknown".into(),
        }
    }
}

fn version_token(e_tag: Option<String>, version: Option<String>) -> String {
    e_tag.or(version).unwrap_or_else(|| "0".into())
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = Self::store_path(path);
        match self.store.get(&location).await {
            Ok(result) => result
                .bytes()
                .await
                .map_err(|e| Error::storage_with_source(format!("read failed: {path}"), e)),
            Err(object_store::Error::NotFound { .. }) => {
                Err(Error::NotFound(format!("object not found: {path}")))
            }
            Err(e) => Err(Error::storage_with_source(format!("get failed: {path}"), e)),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let location = Self::store_path(path);
        let mode = match precondition {
            WritePrecondition::DoesNotExist => PutMode::Create,
            WritePrecondition::MatchesVersion(token) => PutMode::Update(UpdateVersion {
                e_tag: Some(token),
                version: None,
            }),
            WritePrecondition::None => PutMode::Overwrite,
        };
        let options = PutOptions::from(mode);

        match self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await
        {
            Ok(result) => Ok(WriteResult::Success {
                version: version_token(result.e_tag, result.version),
            }),
            Err(
                object_store::Error::AlreadyExists { .. }
                | object_store::Error::Precondition { .. },
            ) => Ok(WriteResult::PreconditionFailed {
                current_version: self.current_version(&location).await,
            }),
            Err(e) => Err(Error::storage_with_source(format!("put failed: {path}"), e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = Self::store_path(path);
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Error::storage_with_source(
                format!("delete failed: {path}"),
                e,
            )),
        }
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let location = Self::store_path(path);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                path: path.to_string(),
                size: meta.size as u64,
                version: version_token(meta.e_tag, meta.version),
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::storage_with_source(
                format!("head failed: {path}"),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello");

        let result = backend
            .put("t/file.json", data.clone(), WritePrecondition::None)
            .await
            .expect("put");
        assert!(matches!(result, WriteResult::Success { ref version } if version == "1"));

        let retrieved = backend.get("t/file.json").await.expect("get");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn memory_does_not_exist_precondition() {
        let backend = MemoryBackend::new();

        let first = backend
            .put("x", Bytes::from("a"), WritePrecondition::DoesNotExist)
            .await
            .expect("put");
        assert!(matches!(first, WriteResult::Success { .. }));

        let second = backend
            .put("x", Bytes::from("b"), WritePrecondition::DoesNotExist)
            .await
            .expect("put");
        assert!(matches!(second, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn memory_matches_version_precondition() {
        let backend = MemoryBackend::new();

        let WriteResult::Success { version } = backend
            .put("x", Bytes::from("v1"), WritePrecondition::None)
            .await
            .expect("put")
        else {
            panic!("expected success");
        };

        let updated = backend
            .put(
                "x",
                Bytes::from("v2"),
                WritePrecondition::MatchesVersion(version.clone()),
            )
            .await
            .expect("put");
        assert!(matches!(updated, WriteResult::Success { .. }));

        let stale = backend
            .put(
                "x",
                Bytes::from("v3"),
                WritePrecondition::MatchesVersion(version),
            )
            .await
            .expect("put");
        assert!(matches!(stale, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn memory_delete_is_idempotent() {
        let backend = MemoryBackend::new();
        backend
            .put("gone", Bytes::from("x"), WritePrecondition::None)
            .await
            .expect("put");

        backend.delete("gone").await.expect("first delete");
        backend.delete("gone").await.expect("second delete");
        assert!(backend.head("gone").await.expect("head").is_none());
    }

    #[tokio::test]
    async fn object_store_memory_cas() {
        let backend = ObjectStoreBackend::from_url("mem://").expect("backend");

        let first = backend
            .put("m", Bytes::from("a"), WritePrecondition::DoesNotExist)
            .await
            .expect("put");
        let WriteResult::Success { version } = first else {
            panic!("expected success");
        };

        let conflicting = backend
            .put("m", Bytes::from("b"), WritePrecondition::DoesNotExist)
            .await
            .expect("put");
        assert!(matches!(
            conflicting,
            WriteResult::PreconditionFailed { .. }
        ));

        let updated = backend
            .put(
                "m",
                Bytes::from("c"),
                WritePrecondition::MatchesVersion(version),
            )
            .await
            .expect("put");
        assert!(matches!(updated, WriteResult::Success { .. }));
        assert_eq!(backend.get("m").await.expect("get"), Bytes::from("c"));
    }

    #[test]
    fn unsupported_scheme_rejected() {
        let err = ObjectStoreBackend::from_url("gopher://x").expect_err("should fail");
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
