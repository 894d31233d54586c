//! In-memory store backend for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{JobStore, StoreError};
use crate::core::job::Job;
use crate::core::types::Slug;

/// Thread-safe in-memory backend. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Slug, Job>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::LockPoisoned)?;
        if jobs.contains_key(&job.slug) {
            return Err(StoreError::Duplicate(job.slug.clone()));
        }
        jobs.insert(job.slug.clone(), job);
        Ok(())
    }

    async fn put(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::LockPoisoned)?;
        jobs.insert(job.slug.clone(), job);
        Ok(())
    }

    async fn get(&self, slug: &Slug) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(jobs.get(slug).cloned())
    }

    async fn list(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(jobs.values().cloned().collect())
    }

    async fn delete(&self, slug: &Slug) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(jobs.remove(slug).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run::RunSpec;
    use std::path::PathBuf;

    fn sample_job(name: &str) -> Job {
        Job::new(
            name,
            "* * * * *",
            RunSpec {
                prompt: Some("p".into()),
                ..Default::default()
            },
            None,
            PathBuf::from("/tmp"),
        )
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = InMemoryJobStore::new();
        let job = sample_job("A");

        store.create(job.clone()).await.unwrap();
        assert!(store.get(&job.slug).await.unwrap().is_some());
        assert!(matches!(
            store.create(sample_job("A")).await,
            Err(StoreError::Duplicate(_))
        ));

        assert!(store.delete(&job.slug).await.unwrap());
        assert!(store.get(&job.slug).await.unwrap().is_none());
        assert!(!store.delete(&job.slug).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_upserts() {
        let store = InMemoryJobStore::new();
        let mut job = sample_job("B");
        store.put(job.clone()).await.unwrap();
        job.schedule = "0 9 * * *".into();
        store.put(job.clone()).await.unwrap();

        let loaded = store.get(&job.slug).await.unwrap().unwrap();
        assert_eq!(loaded.schedule, "0 9 * * *");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
