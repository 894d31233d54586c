//! Filesystem store: one JSON file per slug.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{JobStore, StoreError};
use crate::core::job::Job;
use crate::core::types::Slug;

/// Store backend writing `<jobs_dir>/<slug>.json` records.
///
/// The directory is created on first access. Records are decoded through
/// the tolerant [`Job::from_value`] path, so a partially-written record
/// loads with safe defaults instead of poisoning list operations.
pub struct FsJobStore {
    jobs_dir: PathBuf,
}

impl FsJobStore {
    /// Create a store rooted at the given jobs directory.
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    fn record_path(&self, slug: &Slug) -> PathBuf {
        self.jobs_dir.join(format!("{slug}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.jobs_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.jobs_dir.clone(),
                source,
            })
    }

    async fn write_record(&self, job: &Job) -> Result<(), StoreError> {
        self.ensure_dir().await?;
        let path = self.record_path(&job.slug);
        // Indented JSON so records stay hand-inspectable.
        let body = serde_json::to_string_pretty(job).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    async fn read_record(&self, path: &Path) -> Result<Job, StoreError> {
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let value: Value = serde_json::from_str(&body).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Job::from_value(&value))
    }
}

#[async_trait]
impl JobStore for FsJobStore {
    async fn create(&self, job: Job) -> Result<(), StoreError> {
        self.ensure_dir().await?;
        let path = self.record_path(&job.slug);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?
        {
            return Err(StoreError::Duplicate(job.slug.clone()));
        }
        self.write_record(&job).await
    }

    async fn put(&self, job: Job) -> Result<(), StoreError> {
        self.write_record(&job).await
    }

    async fn get(&self, slug: &Slug) -> Result<Option<Job>, StoreError> {
        let path = self.record_path(slug);
        match self.read_record(&path).await {
            Ok(job) => Ok(Some(job)),
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.jobs_dir).await {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.jobs_dir.clone(),
                    source,
                });
            }
        };
        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            path: self.jobs_dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path).await {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("skipping unreadable job record: {e}"),
            }
        }
        Ok(jobs)
    }

    async fn delete(&self, slug: &Slug) -> Result<bool, StoreError> {
        let path = self.record_path(slug);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
