//! Invocation builder: run spec → executable + argument vector.
//!
//! The argument ordering here is a contract. The scheduler renderers embed
//! the same vector into unit files (where it gets quoted/escaped) and the
//! run supervisor spawns it directly, so both must see byte-identical
//! assembly for a given spec.

use std::path::PathBuf;
use tracing::debug;

use crate::core::job::Job;
use crate::core::run::{RunSpec, SpecError};

/// Environment variable overriding the agent executable path.
pub const AGENT_BIN_ENV: &str = "REPRISE_AGENT_BIN";

/// Non-interactive policy override set on every spawned invocation so a
/// scheduled run can never block on a confirmation prompt.
pub const NO_CONFIRM_ENV: &str = "REPRISE_AGENT_NO_CONFIRM";

const DEFAULT_AGENT_BIN: &str = "agent";

const FALLBACK_DIRS: [&str; 2] = ["/usr/local/bin", "/opt/homebrew/bin"];

/// A concrete command name plus ordered argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build the invocation for a normalized run spec.
    ///
    /// The spec must satisfy the prompt/command XOR; everything else is
    /// optional. Ordering: subcommand, `--attach`, `--port`, `--command`,
    /// `--agent`/`--model`/`--variant`/`--format`/`--title`/`--session`,
    /// bare `--share`/`--continue`, one `--file` per attachment, `--`, then
    /// exactly one positional: the argument string (command mode, default
    /// empty) or the prompt text.
    pub fn for_run(run: &RunSpec) -> Result<Self, SpecError> {
        run.validate()?;
        let mut args = vec!["run".to_string()];

        push_flag(&mut args, "--attach", &run.attach_url);
        if let Some(port) = run.port {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        push_flag(&mut args, "--command", &run.command);
        push_flag(&mut args, "--agent", &run.agent);
        push_flag(&mut args, "--model", &run.model);
        push_flag(&mut args, "--variant", &run.variant);
        if let Some(format) = run.run_format {
            args.push("--format".to_string());
            args.push(format.as_str().to_string());
        }
        push_flag(&mut args, "--title", &run.title);
        push_flag(&mut args, "--session", &run.session);
        if run.share == Some(true) {
            args.push("--share".to_string());
        }
        if run.continue_session == Some(true) {
            args.push("--continue".to_string());
        }
        for file in run.files.as_deref().unwrap_or_default() {
            args.push("--file".to_string());
            args.push(file.clone());
        }
        args.push("--".to_string());
        if run.command.is_some() {
            args.push(run.arguments.clone().unwrap_or_default());
        } else {
            // validate() guarantees the prompt is present in this branch.
            args.push(run.prompt.clone().unwrap_or_default());
        }

        Ok(Self {
            command: resolve_agent_bin(),
            args,
        })
    }

    /// Build the invocation for a job's effective run spec.
    pub fn for_job(job: &Job) -> Result<Self, SpecError> {
        Self::for_run(&job.effective_run()?)
    }
}

fn push_flag(args: &mut Vec<String>, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        args.push(name.to_string());
        args.push(value.clone());
    }
}

/// Resolve the agent executable.
///
/// Order: the `REPRISE_AGENT_BIN` override, a `$PATH` scan, the fixed
/// fallback install locations, then the bare command name. Never fails —
/// scheduling a job whose executable appears later is legitimate, and the
/// spawn itself reports a missing binary.
pub fn resolve_agent_bin() -> String {
    if let Some(bin) = std::env::var_os(AGENT_BIN_ENV) {
        let bin = bin.to_string_lossy().trim().to_string();
        if !bin.is_empty() {
            return bin;
        }
    }

    if let Some(path) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path) {
            let candidate = dir.join(DEFAULT_AGENT_BIN);
            if candidate.is_file() {
                return candidate.display().to_string();
            }
        }
    }

    for dir in FALLBACK_DIRS {
        let candidate = PathBuf::from(dir).join(DEFAULT_AGENT_BIN);
        if candidate.is_file() {
            return candidate.display().to_string();
        }
    }
    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(".local").join("bin").join(DEFAULT_AGENT_BIN);
        if candidate.is_file() {
            return candidate.display().to_string();
        }
    }

    debug!("agent executable not found on disk, using bare command name");
    DEFAULT_AGENT_BIN.to_string()
}

/// Serializes tests that touch the process-global agent binary override.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RunFormat;

    fn args_of(run: &RunSpec) -> Vec<String> {
        Invocation::for_run(run).unwrap().args
    }

    #[test]
    fn test_prompt_mode_minimal() {
        let run = RunSpec {
            prompt: Some("find deals".into()),
            ..Default::default()
        };
        assert_eq!(args_of(&run), vec!["run", "--", "find deals"]);
    }

    #[test]
    fn test_command_mode_trailing_tokens() {
        let run = RunSpec {
            command: Some("echo".into()),
            arguments: Some("hi".into()),
            ..Default::default()
        };
        let args = args_of(&run);
        assert_eq!(args, vec!["run", "--command", "echo", "--", "hi"]);
        assert!(!args.iter().any(|a| a.contains("prompt")));
    }

    #[test]
    fn test_command_mode_defaults_empty_arguments() {
        let run = RunSpec {
            command: Some("ls".into()),
            ..Default::default()
        };
        let args = args_of(&run);
        assert_eq!(args.last().unwrap(), "");
        assert_eq!(args[args.len() - 2], "--");
    }

    #[test]
    fn test_full_flag_ordering() {
        let run = RunSpec {
            prompt: Some("do it".into()),
            attach_url: Some("https://example.com/page".into()),
            port: Some(8080),
            agent: Some("general".into()),
            model: Some("m1".into()),
            variant: Some("fast".into()),
            title: Some("My Run".into()),
            share: Some(true),
            continue_session: Some(true),
            session: Some("s-123".into()),
            run_format: Some(RunFormat::Json),
            files: Some(vec!["a.txt".into(), "b.txt".into()]),
            ..Default::default()
        };
        assert_eq!(
            args_of(&run),
            vec![
                "run",
                "--attach",
                "https://example.com/page",
                "--port",
                "8080",
                "--agent",
                "general",
                "--model",
                "m1",
                "--variant",
                "fast",
                "--format",
                "json",
                "--title",
                "My Run",
                "--session",
                "s-123",
                "--share",
                "--continue",
                "--file",
                "a.txt",
                "--file",
                "b.txt",
                "--",
                "do it",
            ]
        );
    }

    #[test]
    fn test_files_preserve_order() {
        let run = RunSpec {
            prompt: Some("p".into()),
            files: Some(vec!["z.md".into(), "a.md".into()]),
            ..Default::default()
        };
        let args = args_of(&run);
        let file_args: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "--file")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(file_args, vec!["z.md", "a.md"]);
    }

    #[test]
    fn test_rejects_invalid_spec() {
        assert!(Invocation::for_run(&RunSpec::default()).is_err());
        let both = RunSpec {
            prompt: Some("p".into()),
            command: Some("c".into()),
            ..Default::default()
        };
        assert!(Invocation::for_run(&both).is_err());
    }

    #[test]
    fn test_resolve_honors_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        let prior = std::env::var_os(AGENT_BIN_ENV);
        std::env::set_var(AGENT_BIN_ENV, "/custom/agent-bin");
        let resolved = resolve_agent_bin();
        match prior {
            Some(v) => std::env::set_var(AGENT_BIN_ENV, v),
            None => std::env::remove_var(AGENT_BIN_ENV),
        }
        assert_eq!(resolved, "/custom/agent-bin");
    }

    #[test]
    fn test_resolve_never_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        let resolved = resolve_agent_bin();
        assert!(!resolved.is_empty());
    }
}
