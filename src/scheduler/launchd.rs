//! launchd LaunchAgent adapter (macOS).
//!
//! One plist per job under `~/Library/LaunchAgents`, labelled
//! `com.reprise.<slug>`, with `StartCalendarInterval` entries compiled
//! from the job's cron expression. launchd fires at the union of all
//! entries, which is what preserves cron's day-of-month/day-of-week OR.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{augmented_path, Paths};
use crate::core::cron::{daemon_calendars, DaemonCalendar};
use crate::core::job::Job;
use crate::core::types::Slug;
use crate::execution::{Invocation, NO_CONFIRM_ENV};

use super::{remove_unit, write_unit, InstallError, RenderedUnit, SchedulerAdapter, ServiceControl};

pub struct LaunchdAdapter {
    paths: Paths,
    control: Arc<dyn ServiceControl>,
}

impl LaunchdAdapter {
    pub fn new(paths: Paths, control: Arc<dyn ServiceControl>) -> Self {
        Self { paths, control }
    }

    fn render_plist(&self, job: &Job) -> Result<String, InstallError> {
        let calendars = daemon_calendars(&job.schedule)?;
        let invocation = Invocation::for_job(job)?;
        let log = self.paths.log_file(&job.slug);

        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(concat!(
            "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
            "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n"
        ));
        out.push_str("<plist version=\"1.0\">\n<dict>\n");

        key_string(&mut out, 1, "Label", &self.paths.launchd_label(&job.slug));
        key_string(
            &mut out,
            1,
            "WorkingDirectory",
            &job.workdir.to_string_lossy(),
        );

        push_line(&mut out, 1, "<key>EnvironmentVariables</key>");
        push_line(&mut out, 1, "<dict>");
        key_string(&mut out, 2, "PATH", &augmented_path());
        key_string(&mut out, 2, NO_CONFIRM_ENV, "1");
        push_line(&mut out, 1, "</dict>");

        push_line(&mut out, 1, "<key>ProgramArguments</key>");
        push_line(&mut out, 1, "<array>");
        push_line(
            &mut out,
            2,
            &format!("<string>{}</string>", xml_escape(&invocation.command)),
        );
        for arg in &invocation.args {
            push_line(
                &mut out,
                2,
                &format!("<string>{}</string>", xml_escape(arg)),
            );
        }
        push_line(&mut out, 1, "</array>");

        push_line(&mut out, 1, "<key>StartCalendarInterval</key>");
        if let [single] = calendars.as_slice() {
            calendar_dict(&mut out, 1, single);
        } else {
            push_line(&mut out, 1, "<array>");
            for calendar in &calendars {
                calendar_dict(&mut out, 2, calendar);
            }
            push_line(&mut out, 1, "</array>");
        }

        key_string(&mut out, 1, "StandardOutPath", &log.to_string_lossy());
        key_string(&mut out, 1, "StandardErrorPath", &log.to_string_lossy());
        push_line(&mut out, 1, "<key>RunAtLoad</key>");
        push_line(&mut out, 1, "<false/>");

        out.push_str("</dict>\n</plist>\n");
        Ok(out)
    }

    async fn launchctl(&self, verb: &str, plist: &str) -> Result<(), InstallError> {
        self.control
            .run("launchctl", &[verb.to_string(), plist.to_string()])
            .await
    }
}

#[async_trait]
impl SchedulerAdapter for LaunchdAdapter {
    fn render(&self, job: &Job) -> Result<RenderedUnit, InstallError> {
        Ok(RenderedUnit {
            files: vec![(self.paths.plist_file(&job.slug), self.render_plist(job)?)],
        })
    }

    async fn install(&self, job: &Job) -> Result<(), InstallError> {
        let plist = self.paths.plist_file(&job.slug);
        let contents = self.render_plist(job)?;
        let plist_str = plist.to_string_lossy().to_string();
        // A stale agent may still be loaded from a previous install.
        let _ = self.launchctl("unload", &plist_str).await;
        write_unit(&plist, &contents).await?;
        self.launchctl("load", &plist_str).await
    }

    async fn uninstall(&self, slug: &Slug) -> Result<(), InstallError> {
        let plist = self.paths.plist_file(slug);
        let _ = self
            .launchctl("unload", &plist.to_string_lossy())
            .await;
        remove_unit(&plist).await
    }
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str("    ");
    }
    out.push_str(line);
    out.push('\n');
}

fn key_string(out: &mut String, depth: usize, key: &str, value: &str) {
    push_line(out, depth, &format!("<key>{}</key>", xml_escape(key)));
    push_line(out, depth, &format!("<string>{}</string>", xml_escape(value)));
}

// Key order matches launchd's own plist output.
fn calendar_dict(out: &mut String, depth: usize, calendar: &DaemonCalendar) {
    push_line(out, depth, "<dict>");
    let fields = [
        ("Minute", calendar.minute),
        ("Hour", calendar.hour),
        ("Day", calendar.day),
        ("Month", calendar.month),
        ("Weekday", calendar.weekday),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            push_line(out, depth + 1, &format!("<key>{key}</key>"));
            push_line(out, depth + 1, &format!("<integer>{value}</integer>"));
        }
    }
    push_line(out, depth, "</dict>");
}

fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
