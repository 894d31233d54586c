//! Run supervision.
//!
//! Spawns the agent CLI for a job, streams its output into the job's
//! append-only log, and records the lifecycle on the stored record:
//! `running` on spawn, then `success` or `failed` when the process exits.
//! The child runs in its own process group so a supervisor shutdown does
//! not take scheduled work down with it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{augmented_path, Paths};
use crate::core::job::Job;
use crate::core::run::{RunSpec, SpecError};
use crate::core::types::{RunSource, RunStatus, Slug};
use crate::storage::{JobStore, StoreError};

use super::invocation::{Invocation, NO_CONFIRM_ENV};

/// Errors that can occur while starting a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job log could not be opened for appending.
    #[error("could not open log at '{path}': {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The agent process could not be spawned at all.
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Final result of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// Handle to an in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    outcome: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wait for the run to finish. `None` if the supervision task panicked.
    pub async fn wait(self) -> Option<RunOutcome> {
        self.outcome.await.ok()
    }
}

/// Spawns agent runs and records their outcomes.
pub struct Supervisor {
    store: Arc<dyn JobStore>,
    paths: Paths,
}

impl Supervisor {
    pub fn new(store: Arc<dyn JobStore>, paths: Paths) -> Self {
        Self { store, paths }
    }

    /// Start a run for a job and return a handle to its outcome.
    ///
    /// Overrides, when given, are merged over the job's effective run spec
    /// field-by-field. The record is marked `running` before this returns;
    /// the terminal state is written by the supervision task.
    pub async fn run(
        &self,
        job: &Job,
        source: RunSource,
        overrides: Option<&RunSpec>,
    ) -> Result<RunHandle, RunError> {
        let base = job.effective_run()?;
        let spec = match overrides {
            Some(overrides) => base.merged_with(overrides),
            None => base,
        }
        .normalized();
        let invocation = Invocation::for_run(&spec)?;

        let log_path = self.paths.log_file(&job.slug);
        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RunError::Log {
                    path: log_path.clone(),
                    source,
                })?;
        }
        let mut log = open_append(&log_path).await?;

        let run_id = Uuid::new_v4();
        append_marker(
            &mut log,
            &log_path,
            &format!("run {run_id} started ({})", source.as_str()),
        )
        .await?;

        let mut command = Command::new(&invocation.command);
        command
            .args(&invocation.args)
            .current_dir(&job.workdir)
            .env("PATH", augmented_path())
            .env(NO_CONFIRM_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                let message = format!("failed to launch '{}': {err}", invocation.command);
                let _ =
                    append_marker(&mut log, &log_path, &format!("run {run_id}: {message}")).await;
                let mut record = job.clone();
                record.mark_running(source);
                record.mark_failed(None, message);
                if let Err(store_err) = self.store.put(record).await {
                    error!(slug = %job.slug, %store_err, "failed to record spawn failure");
                }
                return Err(RunError::Spawn {
                    command: invocation.command,
                    source: err,
                });
            }
        };

        job_running(&*self.store, job, source).await?;
        info!(slug = %job.slug, %run_id, "run started");

        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        let slug = job.slug.clone();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_log = open_append(&log_path).await?;
        let stderr_log = open_append(&log_path).await?;

        tokio::spawn(async move {
            let out_pipe = async {
                if let Some(mut stdout) = stdout {
                    let mut log = stdout_log;
                    let _ = tokio::io::copy(&mut stdout, &mut log).await;
                }
            };
            let err_pipe = async {
                if let Some(mut stderr) = stderr {
                    let mut log = stderr_log;
                    let _ = tokio::io::copy(&mut stderr, &mut log).await;
                }
            };
            let (_, _, wait) = tokio::join!(out_pipe, err_pipe, child.wait());

            let outcome = match wait {
                Ok(status) if status.success() => RunOutcome {
                    status: RunStatus::Success,
                    exit_code: Some(0),
                    error: None,
                },
                Ok(status) => {
                    let (exit_code, message) = describe_exit(&status);
                    RunOutcome {
                        status: RunStatus::Failed,
                        exit_code,
                        error: Some(message),
                    }
                }
                Err(err) => RunOutcome {
                    status: RunStatus::Failed,
                    exit_code: None,
                    error: Some(format!("wait failed: {err}")),
                },
            };

            let marker = match &outcome.error {
                None => format!("run {run_id} finished (exit code 0)"),
                Some(message) => format!("run {run_id} failed: {message}"),
            };
            let _ = append_marker(&mut log, &log_path, &marker).await;

            if let Err(err) = record_outcome(&*store, &slug, &outcome).await {
                error!(slug = %slug, %err, "failed to record run outcome");
            }
            let _ = tx.send(outcome);
        });

        Ok(RunHandle {
            run_id,
            outcome: rx,
        })
    }
}

async fn open_append(path: &PathBuf) -> Result<tokio::fs::File, RunError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| RunError::Log {
            path: path.clone(),
            source,
        })
}

async fn append_marker(
    log: &mut tokio::fs::File,
    path: &PathBuf,
    message: &str,
) -> Result<(), RunError> {
    let line = format!("[reprise] {} {}\n", Utc::now().to_rfc3339(), message);
    log.write_all(line.as_bytes())
        .await
        .map_err(|source| RunError::Log {
            path: path.clone(),
            source,
        })
}

async fn job_running(store: &dyn JobStore, job: &Job, source: RunSource) -> Result<(), StoreError> {
    let mut record = job.clone();
    record.mark_running(source);
    store.put(record).await
}

async fn record_outcome(
    store: &dyn JobStore,
    slug: &Slug,
    outcome: &RunOutcome,
) -> Result<(), StoreError> {
    // Re-read rather than clobbering: the record may have been edited
    // while the run was in flight.
    let Some(mut record) = store.get(slug).await? else {
        warn!(%slug, "job deleted mid-run, outcome not recorded");
        return Ok(());
    };
    match outcome.status {
        RunStatus::Success => record.mark_success(),
        _ => record.mark_failed(
            outcome.exit_code,
            outcome.error.clone().unwrap_or_else(|| "failed".to_string()),
        ),
    }
    store.put(record).await
}

fn describe_exit(status: &std::process::ExitStatus) -> (Option<i32>, String) {
    if let Some(code) = status.code() {
        return (Some(code), format!("exited with code {code}"));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (None, format!("terminated by signal {signal}"));
        }
    }
    (None, "terminated without exit code".to_string())
}
