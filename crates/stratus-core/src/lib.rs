//! # stratus-core
//!
//! Core abstractions for the Stratus storage-location catalog.
//!
//! This crate provides the foundational types and traits used across all
//! Stratus components:
//!
//! - **Platform Context**: Explicit role/warehouse context threaded through
//!   every collaborator call
//! - **Metadata Registry**: The contract for the platform's volume and
//!   stage registries, with HTTP and in-memory implementations
//! - **Catalog Store**: Object-storage-shaped persistence with conditional
//!   writes for atomic pointer swaps
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `stratus-core` is the only crate allowed to define shared primitives.
//! The pipeline crate consumes the platform exclusively through the
//! [`registry::MetadataRegistry`] trait defined here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod context;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod registry;
pub mod storage;

// Re-export key types at crate root for ergonomics
pub use context::PlatformContext;
pub use error::{Error, Result};
pub use gateway::HttpRegistry;
pub use observability::{init_logging, LogFormat};
pub use registry::{DescriptorRow, MemoryRegistry, MetadataRegistry, StageListing, VolumeSummary};
pub use storage::{
    MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend, WritePrecondition, WriteResult,
};
