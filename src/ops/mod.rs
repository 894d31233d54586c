//! Public operations surface.
//!
//! [`JobService`] ties the store, the scheduler adapter, and the run
//! supervisor together behind the operations an external dispatch layer
//! calls: create, list, get, update, delete, run-now, and logs.
//!
//! Validation always runs before any persistence or OS mutation. Create
//! rolls the record back when unit installation fails; update restores the
//! prior record and reinstalls its unit, so a failed update never leaves a
//! job silently unscheduled.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Paths;
use crate::core::cron::{describe, validate_schedule, CronError};
use crate::core::job::Job;
use crate::core::run::{RunSpec, SpecError};
use crate::core::types::{RunSource, Slug};
use crate::execution::{RunError, RunHandle, Supervisor};
use crate::scheduler::{InstallError, RenderedUnit, SchedulerAdapter};
use crate::storage::{logs, JobStore, StoreError};

/// Aggregate error for the operations surface.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Run(#[from] RunError),

    /// No job matched the query by slug, derived slug, or name.
    #[error("no job matching '{0}'")]
    UnknownJob(String),
}

/// Inputs for creating a job.
#[derive(Debug, Clone, Default)]
pub struct CreateJob {
    pub name: String,
    pub schedule: String,
    pub run: RunSpec,
    pub source: Option<String>,
    /// Defaults to the calling process's current directory.
    pub workdir: Option<PathBuf>,
}

/// Field patch for updating a job. `None` leaves the field untouched;
/// the slug never changes, even when the name does.
#[derive(Debug, Clone, Default)]
pub struct UpdateJob {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub run: Option<RunSpec>,
    pub source: Option<String>,
    pub workdir: Option<PathBuf>,
}

/// A job plus derived presentation detail.
#[derive(Debug, Clone)]
pub struct JobDetail {
    pub job: Job,
    /// Human-readable schedule, e.g. "daily at 9:00 AM".
    pub schedule_text: String,
    /// The unit files as currently rendered, when the platform has a
    /// scheduler.
    pub units: Option<RenderedUnit>,
}

/// The operations facade over store, scheduler, and supervisor.
pub struct JobService {
    store: Arc<dyn JobStore>,
    adapter: Arc<dyn SchedulerAdapter>,
    supervisor: Supervisor,
    paths: Paths,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        adapter: Arc<dyn SchedulerAdapter>,
        paths: Paths,
    ) -> Self {
        let supervisor = Supervisor::new(store.clone(), paths.clone());
        Self {
            store,
            adapter,
            supervisor,
            paths,
        }
    }

    /// Create a job and install its scheduler unit.
    ///
    /// Fails without side effects on validation errors or a duplicate
    /// slug. If installation fails after the record was written, the
    /// record is deleted again.
    pub async fn create_job(&self, input: CreateJob) -> Result<Job, OpsError> {
        validate_schedule(&input.schedule)?;
        let workdir = match input.workdir {
            Some(dir) => dir,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        };
        let mut job = Job::new(input.name, input.schedule, input.run, input.source, workdir);
        job.sanitize()?;

        self.store.create(job.clone()).await?;
        if let Err(err) = self.adapter.install(&job).await {
            if let Err(cleanup) = self.store.delete(&job.slug).await {
                error!(slug = %job.slug, %cleanup, "rollback delete failed");
            }
            return Err(err.into());
        }
        info!(slug = %job.slug, schedule = %job.schedule, "job created");
        Ok(job)
    }

    /// All jobs, optionally filtered by source tag, ordered by slug.
    pub async fn list_jobs(&self, source: Option<&str>) -> Result<Vec<Job>, OpsError> {
        let mut jobs = self.store.list().await?;
        if let Some(source) = source {
            jobs.retain(|job| job.source.as_deref() == Some(source));
        }
        jobs.sort_by(|a, b| a.slug.as_str().cmp(b.slug.as_str()));
        Ok(jobs)
    }

    /// Resolve a job by slug, derived slug, or name.
    pub async fn get_job(&self, query: &str) -> Result<Job, OpsError> {
        self.lookup(query).await
    }

    /// A job plus its described schedule and rendered unit files.
    pub async fn job_detail(&self, query: &str) -> Result<JobDetail, OpsError> {
        let job = self.lookup(query).await?;
        let schedule_text = describe(&job.schedule);
        let units = self.adapter.render(&job).ok();
        Ok(JobDetail {
            job,
            schedule_text,
            units,
        })
    }

    /// Patch a job's fields, persist it, and reinstall its unit.
    ///
    /// On install failure the prior record is written back and its unit
    /// reinstalled best-effort before the error is returned.
    pub async fn update_job(&self, query: &str, patch: UpdateJob) -> Result<Job, OpsError> {
        let prior = self.lookup(query).await?;
        let mut next = prior.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(schedule) = patch.schedule {
            next.schedule = schedule;
        }
        if let Some(run) = patch.run {
            next.run = Some(run);
        }
        if let Some(source) = patch.source {
            next.source = Some(source);
        }
        if let Some(workdir) = patch.workdir {
            next.workdir = workdir;
        }

        validate_schedule(&next.schedule)?;
        next.sanitize()?;
        next.updated_at = Utc::now();

        self.store.put(next.clone()).await?;
        if let Err(err) = self.adapter.install(&next).await {
            warn!(slug = %next.slug, %err, "install failed, restoring prior record");
            if let Err(restore) = self.store.put(prior.clone()).await {
                error!(slug = %prior.slug, %restore, "failed to restore prior record");
            }
            if let Err(reinstall) = self.adapter.install(&prior).await {
                error!(slug = %prior.slug, %reinstall, "failed to reinstall prior unit");
            }
            return Err(err.into());
        }
        info!(slug = %next.slug, "job updated");
        Ok(next)
    }

    /// Remove a job's scheduler unit and record. The log file stays on
    /// disk for later inspection.
    pub async fn delete_job(&self, query: &str) -> Result<Job, OpsError> {
        let job = self.lookup(query).await?;
        self.adapter.uninstall(&job.slug).await?;
        self.store.delete(&job.slug).await?;
        info!(slug = %job.slug, "job deleted");
        Ok(job)
    }

    /// Start a manual run, with optional per-call run spec overrides.
    pub async fn run_job_now(
        &self,
        query: &str,
        overrides: Option<RunSpec>,
    ) -> Result<(Job, RunHandle), OpsError> {
        let job = self.lookup(query).await?;
        let handle = self
            .supervisor
            .run(&job, RunSource::Manual, overrides.as_ref())
            .await?;
        Ok((job, handle))
    }

    /// Tail a job's log, newest lines last.
    pub async fn job_logs(
        &self,
        query: &str,
        lines: Option<usize>,
        max_chars: Option<usize>,
    ) -> Result<String, OpsError> {
        let job = self.lookup(query).await?;
        Ok(logs::tail(&self.paths.log_file(&job.slug), lines, max_chars).await?)
    }

    /// Exact slug, then slug derived from the query, then case-insensitive
    /// name match (exact before containment).
    async fn lookup(&self, query: &str) -> Result<Job, OpsError> {
        let query = query.trim();
        if let Some(job) = self.store.get(&Slug::new(query)).await? {
            return Ok(job);
        }
        let derived = Slug::derive(query, None);
        if let Some(job) = self.store.get(&derived).await? {
            return Ok(job);
        }
        let needle = query.to_lowercase();
        let jobs = self.store.list().await?;
        if let Some(job) = jobs.iter().find(|job| job.name.to_lowercase() == needle) {
            return Ok(job.clone());
        }
        if let Some(job) = jobs
            .iter()
            .find(|job| job.name.to_lowercase().contains(&needle))
        {
            return Ok(job.clone());
        }
        Err(OpsError::UnknownJob(query.to_string()))
    }
}
