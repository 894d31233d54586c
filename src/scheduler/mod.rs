//! Native scheduler integration.
//!
//! Jobs are executed by the operating system's own scheduler, not by a
//! resident daemon: launchd LaunchAgents on macOS, systemd user timers on
//! Linux. Each adapter renders the unit files for a job and drives the
//! platform's control tool (`launchctl` / `systemctl --user`) to install
//! or remove them.

mod launchd;
mod systemd;

pub use launchd::LaunchdAdapter;
pub use systemd::SystemdAdapter;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::Paths;
use crate::core::cron::CronError;
use crate::core::job::Job;
use crate::core::run::SpecError;
use crate::core::types::Slug;

/// The host platform, as far as scheduling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Unsupported,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unsupported
        }
    }
}

/// Errors that can occur while installing or removing scheduler units.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Unit file could not be written or removed.
    #[error("scheduler I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform control tool failed.
    #[error("'{program}' failed: {detail}")]
    Command { program: String, detail: String },

    /// No native scheduler is available on this platform.
    #[error("no supported scheduler on this platform")]
    UnsupportedPlatform,
}

/// Shell-out seam for `launchctl` and `systemctl`, fake-able in tests.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), InstallError>;
}

/// Runs the real control tools as child processes.
pub struct SystemControl;

#[async_trait]
impl ServiceControl for SystemControl {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), InstallError> {
        debug!(%program, ?args, "running scheduler control command");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|err| InstallError::Command {
                program: program.to_string(),
                detail: err.to_string(),
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.trim() {
            "" => format!("exit code {:?}", output.status.code()),
            msg => msg.to_string(),
        };
        Err(InstallError::Command {
            program: program.to_string(),
            detail,
        })
    }
}

/// The unit files an adapter would write for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedUnit {
    pub files: Vec<(PathBuf, String)>,
}

/// Installs and removes a job's native scheduler units.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// Render the unit files without touching the system.
    fn render(&self, job: &Job) -> Result<RenderedUnit, InstallError>;

    /// Write the unit files and activate them. Replaces any existing
    /// units for the same slug.
    async fn install(&self, job: &Job) -> Result<(), InstallError>;

    /// Deactivate and delete the units for a slug. Missing units are not
    /// an error; removal must work on half-installed state.
    async fn uninstall(&self, slug: &Slug) -> Result<(), InstallError>;
}

/// Pick the adapter for a platform.
pub fn adapter_for(
    platform: Platform,
    paths: Paths,
    control: Arc<dyn ServiceControl>,
) -> Arc<dyn SchedulerAdapter> {
    match platform {
        Platform::MacOs => Arc::new(LaunchdAdapter::new(paths, control)),
        Platform::Linux => Arc::new(SystemdAdapter::new(paths, control)),
        Platform::Unsupported => Arc::new(UnsupportedAdapter),
    }
}

/// Refuses installs; uninstall is a no-op so delete still works.
pub struct UnsupportedAdapter;

#[async_trait]
impl SchedulerAdapter for UnsupportedAdapter {
    fn render(&self, _job: &Job) -> Result<RenderedUnit, InstallError> {
        Err(InstallError::UnsupportedPlatform)
    }

    async fn install(&self, _job: &Job) -> Result<(), InstallError> {
        Err(InstallError::UnsupportedPlatform)
    }

    async fn uninstall(&self, _slug: &Slug) -> Result<(), InstallError> {
        Ok(())
    }
}

pub(crate) async fn write_unit(path: &Path, contents: &str) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| InstallError::Io {
                path: path.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| InstallError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) async fn remove_unit(path: &Path) -> Result<(), InstallError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(InstallError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
