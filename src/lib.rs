pub mod config;
pub mod core;
pub mod execution;
pub mod ops;
pub mod scheduler;
pub mod storage;
pub mod testing;

pub use crate::config::Paths;
pub use crate::core::cron::{
    daemon_calendars, describe, timer_calendars, validate_schedule, CronError,
};
pub use crate::core::job::Job;
pub use crate::core::run::{RunSpec, SpecError};
pub use crate::core::types::{RunFormat, RunSource, RunStatus, Slug};
pub use crate::execution::{Invocation, RunError, RunHandle, RunOutcome, Supervisor};
pub use crate::ops::{CreateJob, JobDetail, JobService, OpsError, UpdateJob};
pub use crate::scheduler::{
    adapter_for, InstallError, LaunchdAdapter, Platform, SchedulerAdapter, ServiceControl,
    SystemControl, SystemdAdapter,
};
pub use crate::storage::{FsJobStore, InMemoryJobStore, JobStore, StoreError};
