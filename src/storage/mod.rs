//! Job record persistence.
//!
//! Trait-based store with pluggable backends: the filesystem backend used
//! in production (one pretty-printed JSON file per slug) and an in-memory
//! backend for tests.

mod fs;
pub mod logs;
mod memory;

pub use fs::FsJobStore;
pub use memory::InMemoryJobStore;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::job::Job;
use crate::core::types::Slug;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Create was called for a slug that already has a record.
    #[error("a job named '{0}' already exists")]
    Duplicate(Slug),

    /// The slug has no record.
    #[error("no job found for '{0}'")]
    NotFound(Slug),

    /// Filesystem failure with the offending path.
    #[error("store I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record that is not even valid JSON.
    #[error("unreadable record at '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Store lock was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Persistent key→record store for jobs, keyed by slug.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record. Fails with [`StoreError::Duplicate`] when the
    /// slug already exists.
    async fn create(&self, job: Job) -> Result<(), StoreError>;

    /// Overwrite the record for an existing slug.
    async fn put(&self, job: Job) -> Result<(), StoreError>;

    /// Fetch a record, `None` when the slug is unknown.
    async fn get(&self, slug: &Slug) -> Result<Option<Job>, StoreError>;

    /// All records, in unspecified order.
    async fn list(&self) -> Result<Vec<Job>, StoreError>;

    /// Remove a record. Returns whether anything was deleted.
    async fn delete(&self, slug: &Slug) -> Result<bool, StoreError>;
}
