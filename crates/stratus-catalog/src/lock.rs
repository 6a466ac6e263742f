//! Per-table refresh lock.
//!
//! Refreshing the same catalog table from two overlapping runs is
//! undefined, so each table kind carries an advisory lock in the catalog
//! store. Acquisition is a conditional create of the lock object; a TTL
//! lets a crashed holder's claim be taken over; contention is retried
//! with bounded backoff and then reported as [`CatalogError::LockHeld`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use stratus_core::storage::{StorageBackend, WritePrecondition, WriteResult};
use stratus_core::Error;

use crate::error::{CatalogError, Result};
use crate::repository::TableKind;

/// Default claim TTL.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Default acquisition attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const BACKOFF_BASE: Duration = Duration::from_millis(50);
const BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Contents of a lock object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaim {
    /// Unique holder identifier.
    pub holder: String,

    /// Table kind the claim covers.
    pub table: TableKind,

    /// When the claim was taken.
    pub acquired_at: DateTime<Utc>,

    /// When the claim lapses and may be taken over.
    pub expires_at: DateTime<Utc>,
}

impl RefreshClaim {
    fn new(holder: &str, table: TableKind, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(30));
        Self {
            holder: holder.to_string(),
            table,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns whether this claim has lapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Advisory lock guarding refreshes of one table kind.
pub struct RefreshLock {
    store: Arc<dyn StorageBackend>,
    table: TableKind,
    path: String,
    holder: String,
}

impl RefreshLock {
    /// Creates the lock for a table kind. Each instance gets a unique
    /// holder identifier.
    #[must_use]
    pub fn for_table(store: Arc<dyn StorageBackend>, table: TableKind) -> Self {
        Self {
            store,
            table,
            path: format!("locks/{}.lock", table.slug()),
            holder: Ulid::new().to_string(),
        }
    }

    /// Returns the holder identifier for this lock instance.
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Acquires the lock, retrying with backoff on contention.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::LockHeld`] if the claim could not be taken
    /// within `max_attempts`, or a storage error if the store fails.
    pub async fn acquire(&self, ttl: Duration, max_attempts: u32) -> Result<RefreshGuard> {
        let mut backoff = BACKOFF_BASE;

        for attempt in 1..=max_attempts.max(1) {
            if let Some(guard) = self.try_acquire(ttl).await? {
                return Ok(guard);
            }
            if attempt < max_attempts {
                tokio::time::sleep(backoff + jitter()).await;
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
        }

        Err(CatalogError::LockHeld {
            table: self.table,
            message: format!("not acquired after {max_attempts} attempts"),
        })
    }

    /// One acquisition attempt: conditional create, or takeover of an
    /// expired claim via version-matched replace.
    async fn try_acquire(&self, ttl: Duration) -> Result<Option<RefreshGuard>> {
        let claim = RefreshClaim::new(&self.holder, self.table, ttl);
        let payload = Bytes::from(
            serde_json::to_vec(&claim)
                .map_err(|e| Error::serialization(format!("encode lock claim: {e}")))?,
        );

        match self
            .store
            .put(&self.path, payload.clone(), WritePrecondition::DoesNotExist)
            .await
            .map_err(CatalogError::Core)?
        {
            WriteResult::Success { .. } => return Ok(Some(self.guard())),
            WriteResult::PreconditionFailed { .. } => {}
        }

        let Some(existing) = self.read_claim().await? else {
            // Claim vanished between the put and the read; next attempt
            // races for the create again.
            return Ok(None);
        };
        if !existing.is_expired() {
            return Ok(None);
        }

        let Some(meta) = self.store.head(&self.path).await.map_err(CatalogError::Core)? else {
            return Ok(None);
        };
        match self
            .store
            .put(
                &self.path,
                payload,
                WritePrecondition::MatchesVersion(meta.version),
            )
            .await
            .map_err(CatalogError::Core)?
        {
            WriteResult::Success { .. } => Ok(Some(self.guard())),
            WriteResult::PreconditionFailed { .. } => Ok(None),
        }
    }

    fn guard(&self) -> RefreshGuard {
        RefreshGuard {
            store: Arc::clone(&self.store),
            path: self.path.clone(),
            holder: self.holder.clone(),
            released: false,
        }
    }

    /// Reads the current claim, if any.
    pub async fn read_claim(&self) -> Result<Option<RefreshClaim>> {
        read_claim_at(self.store.as_ref(), &self.path).await
    }

    /// Returns whether an unexpired claim currently exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the claim cannot be read.
    pub async fn is_held(&self) -> Result<bool> {
        Ok(self
            .read_claim()
            .await?
            .is_some_and(|claim| !claim.is_expired()))
    }
}

async fn read_claim_at(
    store: &dyn StorageBackend,
    path: &str,
) -> Result<Option<RefreshClaim>> {
    match store.get(path).await {
        Ok(data) => {
            let claim = serde_json::from_slice(&data)
                .map_err(|e| Error::serialization(format!("decode lock claim: {e}")))?;
            Ok(Some(claim))
        }
        Err(Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// RAII guard for a held refresh lock.
///
/// Dropped guards release best-effort; prefer calling [`Self::release`]
/// so release errors surface.
pub struct RefreshGuard {
    store: Arc<dyn StorageBackend>,
    path: String,
    holder: String,
    released: bool,
}

impl RefreshGuard {
    /// Explicitly releases the claim if this guard still owns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the claim cannot be read or deleted.
    pub async fn release(mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        if let Some(claim) = read_claim_at(self.store.as_ref(), &self.path).await? {
            if claim.holder == self.holder {
                self.store.delete(&self.path).await.map_err(CatalogError::Core)?;
            }
        }
        self.released = true;
        Ok(())
    }
}

impl std::fmt::Debug for RefreshGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGuard")
            .field("path", &self.path)
            .field("holder", &self.holder)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.released {
            let store = Arc::clone(&self.store);
            let path = self.path.clone();
            let holder = self.holder.clone();
            tokio::spawn(async move {
                if let Ok(Some(claim)) = read_claim_at(store.as_ref(), &path).await {
                    if claim.holder == holder {
                        let _ = store.delete(&path).await;
                    }
                }
            });
        }
    }
}

/// Small random-ish jitter so contending holders don't retry in lockstep.
fn jitter() -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    Duration::from_millis(u64::from(nanos) % 25)
}
