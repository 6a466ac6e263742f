//! Error types for catalog pipeline operations.

use thiserror::Error;

use stratus_core::Error as CoreError;

use crate::refresh::RefreshStep;
use crate::repository::TableKind;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while refreshing or querying the catalog tables.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A pipeline step failed outright (not a per-entity skip).
    #[error("{step} failed for {table}: {source}")]
    StepFailed {
        /// Table kind whose refresh failed.
        table: TableKind,
        /// The step that failed.
        step: RefreshStep,
        /// The underlying failure.
        #[source]
        source: CoreError,
    },

    /// The destination table refresh could not complete.
    ///
    /// The table's manifest was not swapped; readers continue to see the
    /// pre-run contents.
    #[error("refresh of {table} could not complete: {message}")]
    RepositoryWrite {
        /// Table kind whose refresh failed.
        table: TableKind,
        /// Description of the write failure.
        message: String,
    },

    /// The per-table refresh lock could not be acquired.
    #[error("refresh lock for {table} is held: {message}")]
    LockHeld {
        /// Table kind whose lock is contended.
        table: TableKind,
        /// Description of the contention.
        message: String,
    },

    /// The run was cancelled; collected data was discarded and the table
    /// was left at its pre-run state.
    #[error("refresh of {table} cancelled during {step}")]
    Cancelled {
        /// Table kind whose refresh was cancelled.
        table: TableKind,
        /// The step at which cancellation was observed.
        step: RefreshStep,
    },

    /// A shared infrastructure error.
    #[error(transparent)]
    Core(#[from] CoreError),
}
