//! The persisted job record.
//!
//! A [`Job`] is one scheduled task, keyed by its [`Slug`]. Records are
//! stored as indented JSON, one file per slug. The schema carries legacy
//! scalar `prompt`/`attachUrl` fields alongside the structured [`RunSpec`];
//! [`Job::effective_run`] is the single place that bridges the two, so no
//! caller ever branches on schema vintage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::run::{RunSpec, SpecError};
use super::types::{RunSource, RunStatus, Slug};

/// A persisted scheduled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Immutable identifier; joins the record, its log, and its unit(s).
    pub slug: Slug,
    /// Display name.
    pub name: String,
    /// Raw 5-field cron expression, stored verbatim.
    pub schedule: String,
    /// Structured run specification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSpec>,
    /// Legacy single-prompt field, read when `run` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Legacy attachment URL, read when `run` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_url: Option<String>,
    /// Optional origin tag for filtering and grouping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Absolute directory the invocation executes in.
    pub workdir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_source: Option<RunSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_error: Option<String>,
}

impl Job {
    /// Create a new record. The slug is derived here and never changes.
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        run: RunSpec,
        source: Option<String>,
        workdir: PathBuf,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            slug: Slug::derive(&name, source.as_deref()),
            name,
            schedule: schedule.into(),
            run: Some(run),
            prompt: None,
            attach_url: None,
            source,
            workdir,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            last_run_source: None,
            last_run_status: None,
            last_run_exit_code: None,
            last_run_error: None,
        }
    }

    /// Tolerant decode from arbitrary JSON.
    ///
    /// Always yields a structurally valid record: missing timestamps
    /// backfill to now, unknown enum strings drop to unset, and a missing
    /// workdir falls back to the process's current directory. A corrupted
    /// or partially-written record never fails to load here; strictness
    /// lives in [`Job::sanitize`].
    pub fn from_value(value: &Value) -> Self {
        let obj = value.as_object();
        let string = |key: &str| {
            obj.and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let timestamp = |key: &str| {
            string(key)
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };
        let now = Utc::now();

        Self {
            slug: Slug::new(string("slug").unwrap_or_default()),
            name: string("name").unwrap_or_default(),
            schedule: string("schedule").unwrap_or_default(),
            run: obj
                .and_then(|o| o.get("run"))
                .filter(|v| v.is_object())
                .map(RunSpec::from_value),
            prompt: string("prompt"),
            attach_url: string("attachUrl"),
            source: string("source"),
            workdir: string("workdir")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))),
            created_at: timestamp("createdAt").unwrap_or(now),
            updated_at: timestamp("updatedAt").unwrap_or(now),
            last_run_at: timestamp("lastRunAt"),
            last_run_source: string("lastRunSource").and_then(|s| match s.as_str() {
                "manual" => Some(RunSource::Manual),
                "scheduled" => Some(RunSource::Scheduled),
                _ => None,
            }),
            last_run_status: string("lastRunStatus").and_then(|s| match s.as_str() {
                "running" => Some(RunStatus::Running),
                "success" => Some(RunStatus::Success),
                "failed" => Some(RunStatus::Failed),
                _ => None,
            }),
            last_run_exit_code: obj
                .and_then(|o| o.get("lastRunExitCode"))
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok()),
            last_run_error: string("lastRunError"),
        }
    }

    /// Strict complement to [`Job::from_value`], run before persistence.
    ///
    /// Trims scalar fields, normalizes the run spec, and validates it.
    pub fn sanitize(&mut self) -> Result<(), SpecError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(SpecError::EmptyName);
        }
        self.schedule = self.schedule.trim().to_string();
        self.source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(run) = &self.run {
            let normalized = run.normalized();
            normalized.validate()?;
            self.run = Some(normalized);
        }
        Ok(())
    }

    /// Resolve the run spec to execute.
    ///
    /// Prefers the structured `run`; otherwise synthesizes one from the
    /// legacy scalars, which keeps pre-`run` records runnable. Fails when
    /// neither path yields a prompt or command.
    pub fn effective_run(&self) -> Result<RunSpec, SpecError> {
        if let Some(run) = &self.run {
            let run = run.normalized();
            if run.prompt.is_some() || run.command.is_some() {
                return Ok(run);
            }
        }
        let legacy = RunSpec {
            prompt: self.prompt.clone(),
            attach_url: self.attach_url.clone(),
            ..Default::default()
        }
        .normalized();
        if legacy.prompt.is_none() {
            return Err(SpecError::MissingPrompt);
        }
        Ok(legacy)
    }

    /// Record the bookkeeping for a freshly spawned run.
    pub fn mark_running(&mut self, source: RunSource) {
        self.last_run_at = Some(Utc::now());
        self.last_run_source = Some(source);
        self.last_run_status = Some(RunStatus::Running);
        self.last_run_exit_code = None;
        self.last_run_error = None;
        self.updated_at = Utc::now();
    }

    /// Record a successful exit.
    pub fn mark_success(&mut self) {
        self.last_run_status = Some(RunStatus::Success);
        self.last_run_exit_code = Some(0);
        self.last_run_error = None;
        self.updated_at = Utc::now();
    }

    /// Record a failure (non-zero exit, signal death, or spawn error).
    pub fn mark_failed(&mut self, exit_code: Option<i32>, error: impl Into<String>) {
        self.last_run_status = Some(RunStatus::Failed);
        self.last_run_exit_code = exit_code;
        self.last_run_error = Some(error.into());
        self.updated_at = Utc::now();
    }
}
