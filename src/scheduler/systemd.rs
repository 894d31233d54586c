//! systemd user-unit adapter (Linux).
//!
//! Two units per job under `~/.config/systemd/user`: a oneshot service
//! `reprise-<slug>.service` that runs the agent, and a timer
//! `reprise-<slug>.timer` with one `OnCalendar=` line per compiled
//! calendar. systemd fires at the union of the lines.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::{augmented_path, Paths};
use crate::core::cron::timer_calendars;
use crate::core::job::Job;
use crate::core::types::Slug;
use crate::execution::{Invocation, NO_CONFIRM_ENV};

use super::{remove_unit, write_unit, InstallError, RenderedUnit, SchedulerAdapter, ServiceControl};

pub struct SystemdAdapter {
    paths: Paths,
    control: Arc<dyn ServiceControl>,
}

impl SystemdAdapter {
    pub fn new(paths: Paths, control: Arc<dyn ServiceControl>) -> Self {
        Self { paths, control }
    }

    fn render_service(&self, job: &Job) -> Result<String, InstallError> {
        let invocation = Invocation::for_job(job)?;
        let log = self.paths.log_file(&job.slug);

        let mut exec = shell_quote(&invocation.command);
        for arg in &invocation.args {
            exec.push(' ');
            exec.push_str(&shell_quote(arg));
        }

        let mut out = String::new();
        writeln!(out, "[Unit]").unwrap();
        writeln!(out, "Description=reprise job {}", job.slug).unwrap();
        writeln!(out).unwrap();
        writeln!(out, "[Service]").unwrap();
        writeln!(out, "Type=oneshot").unwrap();
        writeln!(out, "WorkingDirectory={}", job.workdir.display()).unwrap();
        writeln!(out, "Environment=PATH={}", augmented_path()).unwrap();
        writeln!(out, "Environment={}=1", NO_CONFIRM_ENV).unwrap();
        writeln!(out, "ExecStart={exec}").unwrap();
        writeln!(out, "StandardOutput=append:{}", log.display()).unwrap();
        writeln!(out, "StandardError=append:{}", log.display()).unwrap();
        Ok(out)
    }

    fn render_timer(&self, job: &Job) -> Result<String, InstallError> {
        let calendars = timer_calendars(&job.schedule)?;

        let mut out = String::new();
        writeln!(out, "[Unit]").unwrap();
        writeln!(out, "Description=reprise schedule for {}", job.slug).unwrap();
        writeln!(out).unwrap();
        writeln!(out, "[Timer]").unwrap();
        for line in &calendars {
            writeln!(out, "OnCalendar={line}").unwrap();
        }
        writeln!(out, "Persistent=true").unwrap();
        writeln!(out).unwrap();
        writeln!(out, "[Install]").unwrap();
        writeln!(out, "WantedBy=timers.target").unwrap();
        Ok(out)
    }

    async fn systemctl(&self, args: &[String]) -> Result<(), InstallError> {
        let mut full = vec!["--user".to_string()];
        full.extend_from_slice(args);
        self.control.run("systemctl", &full).await
    }
}

#[async_trait]
impl SchedulerAdapter for SystemdAdapter {
    fn render(&self, job: &Job) -> Result<RenderedUnit, InstallError> {
        Ok(RenderedUnit {
            files: vec![
                (self.paths.service_file(&job.slug), self.render_service(job)?),
                (self.paths.timer_file(&job.slug), self.render_timer(job)?),
            ],
        })
    }

    async fn install(&self, job: &Job) -> Result<(), InstallError> {
        let rendered = self.render(job)?;
        for (path, contents) in &rendered.files {
            write_unit(path, contents).await?;
        }
        let timer = format!("{}.timer", self.paths.unit_name(&job.slug));
        self.systemctl(&["daemon-reload".to_string()]).await?;
        self.systemctl(&["enable".to_string(), timer.clone()]).await?;
        self.systemctl(&["start".to_string(), timer]).await
    }

    async fn uninstall(&self, slug: &Slug) -> Result<(), InstallError> {
        let timer = format!("{}.timer", self.paths.unit_name(slug));
        let _ = self.systemctl(&["stop".to_string(), timer.clone()]).await;
        let _ = self.systemctl(&["disable".to_string(), timer]).await;
        remove_unit(&self.paths.timer_file(slug)).await?;
        remove_unit(&self.paths.service_file(slug)).await?;
        let _ = self.systemctl(&["daemon-reload".to_string()]).await;
        Ok(())
    }
}

/// Single-quote a token for a shell command line, escaping embedded quotes.
fn shell_quote(input: &str) -> String {
    if !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '='))
    {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len() + 2);
    out.push('\'');
    for c in input.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}
