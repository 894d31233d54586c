//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use reprise::testing::RecordingControl;
use reprise::{
    CreateJob, FsJobStore, JobService, JobStore, LaunchdAdapter, Paths, RunSpec, RunStatus, Slug,
    SystemdAdapter,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The agent binary override is process-global state; tests that set it
/// must hold this lock.
pub static AGENT_ENV_LOCK: Mutex<()> = Mutex::new(());

/// A service over the filesystem store and the launchd adapter with a
/// recording (non-shelling) control.
pub fn launchd_service(root: &std::path::Path) -> (JobService, Arc<FsJobStore>, Paths) {
    let paths = Paths::rooted(root);
    let store = Arc::new(FsJobStore::new(paths.jobs_dir()));
    let adapter = Arc::new(LaunchdAdapter::new(
        paths.clone(),
        Arc::new(RecordingControl::new()),
    ));
    (
        JobService::new(store.clone(), adapter, paths.clone()),
        store,
        paths,
    )
}

/// Like [`launchd_service`] but with the systemd adapter.
pub fn systemd_service(root: &std::path::Path) -> (JobService, Arc<FsJobStore>, Paths) {
    let paths = Paths::rooted(root);
    let store = Arc::new(FsJobStore::new(paths.jobs_dir()));
    let adapter = Arc::new(SystemdAdapter::new(
        paths.clone(),
        Arc::new(RecordingControl::new()),
    ));
    (
        JobService::new(store.clone(), adapter, paths.clone()),
        store,
        paths,
    )
}

/// A prompt job creation input.
pub fn prompt_job(name: &str, schedule: &str, prompt: &str) -> CreateJob {
    CreateJob {
        name: name.to_string(),
        schedule: schedule.to_string(),
        run: RunSpec {
            prompt: Some(prompt.to_string()),
            ..Default::default()
        },
        source: None,
        workdir: Some("/tmp".into()),
    }
}

/// Wait for a job's last run to reach an expected status, polling the store.
///
/// More reliable than fixed sleeps since execution time can vary. Polls
/// every 10ms and panics when the timeout is reached first.
pub async fn wait_for_run_status(
    store: &dyn JobStore,
    slug: &Slug,
    expected: RunStatus,
    timeout: Duration,
) {
    let start = tokio::time::Instant::now();
    loop {
        let job = store.get(slug).await.unwrap().unwrap();
        if job.last_run_status == Some(expected) {
            return;
        }
        if start.elapsed() > timeout {
            panic!(
                "Timeout waiting for job {} to reach {:?}, current status: {:?}",
                slug, expected, job.last_run_status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
