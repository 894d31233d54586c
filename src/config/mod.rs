//! State-directory layout and path resolution.
//!
//! Everything the crate writes lives under one state directory: job records
//! in `jobs/`, run logs in `logs/`. Native scheduler units go to the
//! per-user directories the host's service manager watches. `Paths` is
//! resolved once at startup and passed explicitly, so tests can point every
//! consumer at a temp directory.

use std::path::PathBuf;

use crate::core::types::Slug;

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "REPRISE_STATE_DIR";

/// Prefix for launchd labels, followed by the job slug.
pub const LABEL_PREFIX: &str = "com.reprise.";

/// Prefix for systemd unit file names, followed by the job slug.
pub const UNIT_PREFIX: &str = "reprise-";

/// Resolved filesystem layout.
#[derive(Debug, Clone)]
pub struct Paths {
    state_dir: PathBuf,
    launch_agents_dir: PathBuf,
    systemd_user_dir: PathBuf,
}

impl Paths {
    /// Resolve against the real environment: `$REPRISE_STATE_DIR` or
    /// `~/.reprise`, plus the host's per-user unit directories.
    pub fn resolve() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let state_dir = std::env::var_os(STATE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".reprise"));
        Self {
            state_dir,
            launch_agents_dir: home.join("Library").join("LaunchAgents"),
            systemd_user_dir: home.join(".config").join("systemd").join("user"),
        }
    }

    /// Put the entire layout (state and unit directories) under one root.
    /// Intended for tests.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            state_dir: root.join("state"),
            launch_agents_dir: root.join("LaunchAgents"),
            systemd_user_dir: root.join("systemd-user"),
        }
    }

    /// The state directory itself.
    pub fn state_dir(&self) -> &PathBuf {
        &self.state_dir
    }

    /// Directory holding one JSON record per job.
    pub fn jobs_dir(&self) -> PathBuf {
        self.state_dir.join("jobs")
    }

    /// Directory holding one append-only log per job.
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// The record file for a slug.
    pub fn job_file(&self, slug: &Slug) -> PathBuf {
        self.jobs_dir().join(format!("{slug}.json"))
    }

    /// The log file for a slug. Shared by manual runs and the native
    /// scheduler's output redirection.
    pub fn log_file(&self, slug: &Slug) -> PathBuf {
        self.logs_dir().join(format!("{slug}.log"))
    }

    /// launchd label for a slug.
    pub fn launchd_label(&self, slug: &Slug) -> String {
        format!("{LABEL_PREFIX}{slug}")
    }

    /// launchd property-list path for a slug.
    pub fn plist_file(&self, slug: &Slug) -> PathBuf {
        self.launch_agents_dir
            .join(format!("{}.plist", self.launchd_label(slug)))
    }

    /// systemd unit name (without extension) for a slug.
    pub fn unit_name(&self, slug: &Slug) -> String {
        format!("{UNIT_PREFIX}{slug}")
    }

    /// systemd service unit path for a slug.
    pub fn service_file(&self, slug: &Slug) -> PathBuf {
        self.systemd_user_dir
            .join(format!("{}.service", self.unit_name(slug)))
    }

    /// systemd timer unit path for a slug.
    pub fn timer_file(&self, slug: &Slug) -> PathBuf {
        self.systemd_user_dir
            .join(format!("{}.timer", self.unit_name(slug)))
    }
}

/// PATH value used for spawned invocations and rendered units: common
/// user-install locations prepended to the inherited PATH, so the agent CLI
/// resolves even under the service manager's minimal environment.
pub fn augmented_path() -> String {
    let mut parts = vec![
        "/usr/local/bin".to_string(),
        "/opt/homebrew/bin".to_string(),
    ];
    if let Some(home) = dirs::home_dir() {
        parts.push(home.join(".local").join("bin").display().to_string());
    }
    if let Ok(current) = std::env::var("PATH") {
        parts.push(current);
    } else {
        parts.push("/usr/bin:/bin".to_string());
    }
    parts.join(":")
}
