//! Testing utilities for users of the reprise library.
//!
//! - [`RecordingControl`]: a [`ServiceControl`] that records every command
//!   instead of shelling out, optionally failing on a chosen verb.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::scheduler::{InstallError, ServiceControl};

/// A fake `launchctl`/`systemctl` that records invocations.
///
/// # Example
///
/// ```
/// use reprise::testing::RecordingControl;
///
/// let control = RecordingControl::new();
/// // Pass Arc::new(control) to a scheduler adapter, install a job, then
/// // assert on control.commands().
/// assert!(control.commands().is_empty());
/// ```
pub struct RecordingControl {
    commands: Mutex<Vec<(String, Vec<String>)>>,
    fail_on: Option<String>,
}

impl RecordingControl {
    /// A control that accepts every command.
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// A control that fails any command whose arguments contain `verb`.
    pub fn failing_on(verb: impl Into<String>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_on: Some(verb.into()),
        }
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.commands.lock().unwrap().clone()
    }
}

impl Default for RecordingControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceControl for RecordingControl {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), InstallError> {
        self.commands
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        if let Some(verb) = &self.fail_on {
            if args.iter().any(|arg| arg == verb) {
                return Err(InstallError::Command {
                    program: program.to_string(),
                    detail: format!("injected failure on '{verb}'"),
                });
            }
        }
        Ok(())
    }
}
