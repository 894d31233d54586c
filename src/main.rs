//! reprise - recurring agent runs through the host OS scheduler.
//!
//! Usage:
//!   reprise add <name> <schedule> --prompt <text>   Schedule a new job
//!   reprise list                                    List scheduled jobs
//!   reprise show <job>                              Show one job in detail
//!   reprise edit <job> [--schedule ..]              Change a job and reinstall it
//!   reprise remove <job>                            Uninstall and delete a job
//!   reprise run <job>                               Run a job immediately
//!   reprise logs <job>                              Print a job's log tail

use clap::{Parser, Subcommand};
use reprise::{
    adapter_for, describe, CreateJob, FsJobStore, JobService, Paths, Platform, RunFormat, RunSpec,
    SystemControl,
};
use std::path::PathBuf;
use std::sync::Arc;

/// reprise - recurring agent runs through the host OS scheduler
#[derive(Parser)]
#[command(name = "reprise")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a new job
    Add {
        /// Display name; the job's slug is derived from it
        name: String,

        /// 5-field cron expression, e.g. "0 9 * * *"
        schedule: String,

        #[command(flatten)]
        run: RunArgs,

        /// Origin tag used for grouping and filtering
        #[arg(long)]
        source: Option<String>,

        /// Directory the job runs in (default: current directory)
        #[arg(long)]
        workdir: Option<PathBuf>,
    },

    /// List scheduled jobs
    List {
        /// Only jobs with this source tag
        #[arg(long)]
        source: Option<String>,
    },

    /// Show one job in detail, including its rendered unit files
    Show {
        /// Slug or name
        job: String,
    },

    /// Change a job's fields and reinstall its unit
    Edit {
        /// Slug or name
        job: String,

        /// New display name (the slug does not change)
        #[arg(long)]
        name: Option<String>,

        /// New cron expression
        #[arg(long)]
        schedule: Option<String>,

        #[command(flatten)]
        run: RunArgs,

        /// New working directory
        #[arg(long)]
        workdir: Option<PathBuf>,
    },

    /// Uninstall a job's unit and delete its record (the log is kept)
    Remove {
        /// Slug or name
        job: String,
    },

    /// Run a job immediately and wait for it to finish
    Run {
        /// Slug or name
        job: String,

        /// One-off prompt override for this run
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Print a job's log tail
    Logs {
        /// Slug or name
        job: String,

        /// Only the last N lines
        #[arg(short = 'n', long)]
        lines: Option<usize>,

        /// Cap output at this many characters
        #[arg(long)]
        chars: Option<usize>,
    },
}

/// Run spec flags shared by `add` and `edit`.
#[derive(clap::Args, Default)]
struct RunArgs {
    /// Prompt text for the agent (mutually exclusive with --command)
    #[arg(long)]
    prompt: Option<String>,

    /// Slash command to run instead of a prompt
    #[arg(long)]
    command: Option<String>,

    /// Argument string for --command
    #[arg(long)]
    arguments: Option<String>,

    /// File to attach; repeatable
    #[arg(long = "file")]
    files: Vec<String>,

    /// Agent profile to run under
    #[arg(long)]
    agent: Option<String>,

    /// Model override
    #[arg(long)]
    model: Option<String>,

    /// Model variant override
    #[arg(long)]
    variant: Option<String>,

    /// Session title
    #[arg(long)]
    title: Option<String>,

    /// Session id to reuse
    #[arg(long)]
    session: Option<String>,

    /// Share the session
    #[arg(long)]
    share: bool,

    /// Continue the most recent session
    #[arg(long = "continue")]
    continue_session: bool,

    /// Output format: default or json
    #[arg(long)]
    format: Option<String>,

    /// URL to attach to the session
    #[arg(long)]
    attach: Option<String>,

    /// Port to attach on
    #[arg(long)]
    port: Option<u32>,
}

impl RunArgs {
    fn into_spec(self) -> RunSpec {
        RunSpec {
            prompt: self.prompt,
            command: self.command,
            arguments: self.arguments,
            files: if self.files.is_empty() {
                None
            } else {
                Some(self.files)
            },
            agent: self.agent,
            model: self.model,
            variant: self.variant,
            title: self.title,
            share: self.share.then_some(true),
            continue_session: self.continue_session.then_some(true),
            session: self.session,
            run_format: self.format.as_deref().and_then(RunFormat::parse),
            attach_url: self.attach,
            port: self.port,
        }
    }

    fn is_empty(&self) -> bool {
        self.prompt.is_none()
            && self.command.is_none()
            && self.arguments.is_none()
            && self.files.is_empty()
            && self.agent.is_none()
            && self.model.is_none()
            && self.variant.is_none()
            && self.title.is_none()
            && self.session.is_none()
            && !self.share
            && !self.continue_session
            && self.format.is_none()
            && self.attach.is_none()
            && self.port.is_none()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let paths = Paths::resolve();
    let store = Arc::new(FsJobStore::new(paths.jobs_dir()));
    let adapter = adapter_for(Platform::detect(), paths.clone(), Arc::new(SystemControl));
    let service = JobService::new(store, adapter, paths);

    match cli.command {
        Commands::Add {
            name,
            schedule,
            run,
            source,
            workdir,
        } => {
            let job = service
                .create_job(CreateJob {
                    name,
                    schedule,
                    run: run.into_spec(),
                    source,
                    workdir,
                })
                .await?;
            println!(
                "Scheduled '{}' ({}): {}",
                job.name,
                job.slug,
                describe(&job.schedule)
            );
        }
        Commands::List { source } => {
            let jobs = service.list_jobs(source.as_deref()).await?;
            if jobs.is_empty() {
                println!("No jobs scheduled.");
            }
            for job in jobs {
                let status = job
                    .last_run_status
                    .map(|s| format!("{s:?}").to_lowercase())
                    .unwrap_or_else(|| "never run".to_string());
                println!(
                    "{:<28} {:<24} last run: {}",
                    job.slug,
                    describe(&job.schedule),
                    status
                );
            }
        }
        Commands::Show { job } => {
            let detail = service.job_detail(&job).await?;
            println!("{}", serde_json::to_string_pretty(&detail.job)?);
            println!("\nSchedule: {}", detail.schedule_text);
            if let Some(units) = detail.units {
                for (path, contents) in units.files {
                    println!("\n--- {} ---\n{}", path.display(), contents);
                }
            }
        }
        Commands::Edit {
            job,
            name,
            schedule,
            run,
            workdir,
        } => {
            let patch = reprise::UpdateJob {
                name,
                schedule,
                run: if run.is_empty() {
                    None
                } else {
                    Some(run.into_spec())
                },
                source: None,
                workdir,
            };
            let updated = service.update_job(&job, patch).await?;
            println!(
                "Updated '{}': {}",
                updated.slug,
                describe(&updated.schedule)
            );
        }
        Commands::Remove { job } => {
            let removed = service.delete_job(&job).await?;
            println!("Removed '{}' (log kept)", removed.slug);
        }
        Commands::Run { job, prompt } => {
            let overrides = prompt.map(|prompt| RunSpec {
                prompt: Some(prompt),
                ..Default::default()
            });
            let (job, handle) = service.run_job_now(&job, overrides).await?;
            println!("Running '{}' (run {})...", job.slug, handle.run_id());
            match handle.wait().await {
                Some(outcome) => match outcome.error {
                    None => println!("Run finished successfully."),
                    Some(error) => {
                        println!("Run failed: {error}");
                        std::process::exit(1);
                    }
                },
                None => {
                    println!("Run supervision ended unexpectedly.");
                    std::process::exit(1);
                }
            }
        }
        Commands::Logs { job, lines, chars } => {
            let text = service.job_logs(&job, lines, chars).await?;
            if text.is_empty() {
                println!("No log output yet.");
            } else {
                print!("{text}");
            }
        }
    }

    Ok(())
}
