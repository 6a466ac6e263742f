//! Refresh orchestration.
//!
//! Drives the two pipelines end to end: volume paths run
//! collect → index → flatten → write, stage paths run collect → write.
//! The pipelines share no state beyond the repository's two independent
//! tables and may run concurrently. Per-entity failures become skip
//! records in the run report; step failures abort the run for that table
//! with the step and table named, leaving the table at its pre-run state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use ulid::Ulid;

use stratus_core::observability::refresh_span;
use stratus_core::registry::MetadataRegistry;
use stratus_core::{Error, PlatformContext};

use crate::error::{CatalogError, Result};
use crate::flatten::flatten;
use crate::index::VolumeIndexBuilder;
use crate::repository::{StorageCatalogRepository, TableKind};
use crate::stage::StageDescriptorCollector;
use crate::volume::{CollectionOutcome, CollectorConfig, VolumeDescriptorCollector};

/// Steps of a refresh run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStep {
    /// Fetching descriptors from the platform registry.
    Collecting,
    /// Folding collected properties into the volume index.
    Indexing,
    /// Unrolling the index into flat rows.
    Flattening,
    /// Swapping the destination table to the new rows.
    Writing,
}

impl std::fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Collecting => "collecting",
            Self::Indexing => "indexing",
            Self::Flattening => "flattening",
            Self::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// Classification of a per-entity skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Registry call failed or timed out.
    Upstream,
    /// Descriptor could not be parsed.
    MalformedDescriptor,
}

impl FailureKind {
    fn classify(error: &Error) -> Self {
        match error {
            Error::MalformedDescriptor { .. } => Self::MalformedDescriptor,
            _ => Self::Upstream,
        }
    }
}

/// One entity skipped during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntity {
    /// Volume or stage identifier.
    pub entity: String,
    /// Step during which the entity failed.
    pub step: RefreshStep,
    /// Failure classification.
    pub kind: FailureKind,
    /// Failure detail.
    pub message: String,
}

/// Outcome of one table's refresh run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Table that was refreshed.
    pub table: TableKind,
    /// Unique run identifier.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Entities reflected in the refreshed table.
    pub entities_processed: usize,
    /// Entities skipped, with their failure kinds.
    pub skipped: Vec<SkippedEntity>,
    /// Rows written to the table.
    pub rows_written: usize,
    /// Table version after the refresh.
    pub table_version: u64,
}

impl RunReport {
    /// Returns true if any entity was skipped.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Runs the discovery pipelines against a registry and repository.
pub struct RefreshRunner<R: MetadataRegistry + ?Sized> {
    registry: Arc<R>,
    repository: Arc<StorageCatalogRepository>,
    config: CollectorConfig,
}

impl<R: MetadataRegistry + ?Sized> RefreshRunner<R> {
    /// Creates a runner with the default collector configuration.
    #[must_use]
    pub fn new(registry: Arc<R>, repository: Arc<StorageCatalogRepository>) -> Self {
        Self {
            registry,
            repository,
            config: CollectorConfig::default(),
        }
    }

    /// Overrides the collector configuration.
    #[must_use]
    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Rebuilds the `EXTERNAL_VOLUME_PATHS` table from the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration, the table swap, or lock
    /// acquisition fails, or if the run is cancelled. Per-volume failures
    /// are not errors; they land in the report's skip list.
    pub async fn refresh_volume_paths(
        &self,
        ctx: &PlatformContext,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Ulid::new().to_string();
        let span = refresh_span(TableKind::VolumePaths.table_name(), &run_id);
        self.volume_paths_run(ctx, cancel, run_id).instrument(span).await
    }

    async fn volume_paths_run(
        &self,
        ctx: &PlatformContext,
        cancel: &CancellationToken,
        run_id: String,
    ) -> Result<RunReport> {
        let table = TableKind::VolumePaths;
        let started_at = Utc::now();

        let collector =
            VolumeDescriptorCollector::new(Arc::clone(&self.registry), self.config.clone());
        let collections = collector
            .collect(ctx)
            .await
            .map_err(|source| CatalogError::StepFailed {
                table,
                step: RefreshStep::Collecting,
                source,
            })?;

        // Collected data is discarded on cancellation; the table keeps
        // its pre-run contents.
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled {
                table,
                step: RefreshStep::Indexing,
            });
        }

        let mut builder = VolumeIndexBuilder::new();
        let mut skipped = Vec::new();
        let mut processed = 0_usize;
        for collection in collections {
            match collection.outcome {
                CollectionOutcome::Collected(properties) => {
                    builder.add_volume(&collection.volume, &properties);
                    processed += 1;
                }
                CollectionOutcome::Failed(error) => {
                    tracing::warn!(volume = %collection.volume, error = %error, "skipping volume");
                    skipped.push(SkippedEntity {
                        entity: collection.volume,
                        step: RefreshStep::Collecting,
                        kind: FailureKind::classify(&error),
                        message: error.to_string(),
                    });
                }
            }
        }

        let index = builder.finish();
        let rows = flatten(&index);

        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled {
                table,
                step: RefreshStep::Writing,
            });
        }

        let manifest = self.repository.refresh_volume_paths(&rows).await?;

        let report = RunReport {
            table,
            run_id,
            started_at,
            finished_at: Utc::now(),
            entities_processed: processed,
            skipped,
            rows_written: rows.len(),
            table_version: manifest.version,
        };
        tracing::info!(
            processed = report.entities_processed,
            skipped = report.skipped.len(),
            rows = report.rows_written,
            "volume path refresh complete"
        );
        Ok(report)
    }

    /// Rebuilds the `STAGE_PATHS` table from the registry.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::refresh_volume_paths`].
    pub async fn refresh_stage_paths(
        &self,
        ctx: &PlatformContext,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Ulid::new().to_string();
        let span = refresh_span(TableKind::StagePaths.table_name(), &run_id);
        self.stage_paths_run(ctx, cancel, run_id).instrument(span).await
    }

    async fn stage_paths_run(
        &self,
        ctx: &PlatformContext,
        cancel: &CancellationToken,
        run_id: String,
    ) -> Result<RunReport> {
        let table = TableKind::StagePaths;
        let started_at = Utc::now();

        let collector =
            StageDescriptorCollector::new(Arc::clone(&self.registry), self.config.clone());
        let rows = collector
            .collect(ctx)
            .await
            .map_err(|source| CatalogError::StepFailed {
                table,
                step: RefreshStep::Collecting,
                source,
            })?;

        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled {
                table,
                step: RefreshStep::Writing,
            });
        }

        let manifest = self.repository.refresh_stage_paths(&rows).await?;

        let report = RunReport {
            table,
            run_id,
            started_at,
            finished_at: Utc::now(),
            entities_processed: rows.len(),
            skipped: Vec::new(),
            rows_written: rows.len(),
            table_version: manifest.version,
        };
        tracing::info!(
            stages = report.entities_processed,
            "stage path refresh complete"
        );
        Ok(report)
    }

    /// Runs both pipelines concurrently over their disjoint tables.
    ///
    /// Each pipeline's outcome is returned separately; one failing does
    /// not abort the other.
    pub async fn refresh_all(
        &self,
        ctx: &PlatformContext,
        cancel: &CancellationToken,
    ) -> (Result<RunReport>, Result<RunReport>) {
        tokio::join!(
            self.refresh_volume_paths(ctx, cancel),
            self.refresh_stage_paths(ctx, cancel)
        )
    }
}
