//! Core identifier and enum types.
//!
//! [`Slug`] is the single join key between a job's store record, its log
//! file, and its installed scheduler unit(s). It is derived once at creation
//! and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filesystem- and identifier-safe derivation of a job's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a display name and an optional source tag.
    ///
    /// The source, when present, prefixes the name so that jobs installed
    /// from different sources cannot collide on identical names. The
    /// combined string is lowercased, runs of non-alphanumeric characters
    /// collapse to single hyphens, and leading/trailing hyphens are
    /// stripped.
    pub fn derive(name: &str, source: Option<&str>) -> Self {
        let combined = match source {
            Some(source) if !source.trim().is_empty() => format!("{source} {name}"),
            _ => name.to_string(),
        };
        Self(slugify(&combined))
    }

    /// Wrap an already-normalized slug string (e.g. read back from disk).
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Slug {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// What triggered a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunSource {
    /// Triggered by a caller through the run-now operation.
    Manual,
    /// Triggered by the installed native scheduler unit.
    Scheduled,
}

impl RunSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunSource::Manual => "manual",
            RunSource::Scheduled => "scheduled",
        }
    }
}

/// Outcome state of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The process has been spawned and has not yet exited.
    Running,
    /// The process exited with code 0.
    Success,
    /// The process failed to spawn, exited non-zero, or died on a signal.
    Failed,
}

/// Output format requested from the agent CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunFormat {
    /// The CLI's default human-readable output.
    Default,
    /// Machine-readable JSON output.
    Json,
}

impl RunFormat {
    /// The flag value passed to the agent CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunFormat::Default => "default",
            RunFormat::Json => "json",
        }
    }

    /// Parse a stored string, `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(RunFormat::Default),
            "json" => Some(RunFormat::Json),
            _ => None,
        }
    }
}
