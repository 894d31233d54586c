//! Manual runs supervised against real child processes.

use crate::common::{launchd_service, prompt_job, wait_for_run_status, AGENT_ENV_LOCK};
use reprise::execution::AGENT_BIN_ENV;
use reprise::{JobStore, RunSource, RunSpec, RunStatus};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_run_now_records_success_and_logs() {
    let _guard = AGENT_ENV_LOCK.lock().unwrap();
    std::env::set_var(AGENT_BIN_ENV, "/bin/true");
    let root = TempDir::new().unwrap();
    let (service, store, paths) = launchd_service(root.path());

    let job = service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    let (_, handle) = service.run_job_now("standing-desk", None).await.unwrap();
    let outcome = handle.wait().await.unwrap();
    std::env::remove_var(AGENT_BIN_ENV);

    assert_eq!(outcome.status, RunStatus::Success);
    wait_for_run_status(
        store.as_ref(),
        &job.slug,
        RunStatus::Success,
        Duration::from_secs(5),
    )
    .await;

    let record = store.get(&job.slug).await.unwrap().unwrap();
    assert_eq!(record.last_run_source, Some(RunSource::Manual));
    assert_eq!(record.last_run_exit_code, Some(0));

    let log = std::fs::read_to_string(paths.log_file(&job.slug)).unwrap();
    assert!(log.contains("started (manual)"));
    assert!(log.contains("finished (exit code 0)"));
}

#[tokio::test]
async fn test_run_now_records_failure() {
    let _guard = AGENT_ENV_LOCK.lock().unwrap();
    std::env::set_var(AGENT_BIN_ENV, "/bin/false");
    let root = TempDir::new().unwrap();
    let (service, store, _) = launchd_service(root.path());

    let job = service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    let (_, handle) = service.run_job_now("standing-desk", None).await.unwrap();
    let outcome = handle.wait().await.unwrap();
    std::env::remove_var(AGENT_BIN_ENV);

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.exit_code, Some(1));

    let record = store.get(&job.slug).await.unwrap().unwrap();
    assert_eq!(record.last_run_status, Some(RunStatus::Failed));
    assert_eq!(record.last_run_error.as_deref(), Some("exited with code 1"));
}

#[tokio::test]
async fn test_run_now_with_prompt_override() {
    let _guard = AGENT_ENV_LOCK.lock().unwrap();
    std::env::set_var(AGENT_BIN_ENV, "/bin/true");
    let root = TempDir::new().unwrap();
    let (service, _, _) = launchd_service(root.path());

    service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    let overrides = RunSpec {
        prompt: Some("one-off reminder".to_string()),
        ..Default::default()
    };
    let (_, handle) = service
        .run_job_now("standing-desk", Some(overrides))
        .await
        .unwrap();
    let outcome = handle.wait().await.unwrap();
    std::env::remove_var(AGENT_BIN_ENV);

    assert_eq!(outcome.status, RunStatus::Success);
}

#[tokio::test]
async fn test_logs_tail_after_run() {
    let _guard = AGENT_ENV_LOCK.lock().unwrap();
    std::env::set_var(AGENT_BIN_ENV, "/bin/true");
    let root = TempDir::new().unwrap();
    let (service, _, _) = launchd_service(root.path());

    service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();
    let (_, handle) = service.run_job_now("standing-desk", None).await.unwrap();
    handle.wait().await.unwrap();
    std::env::remove_var(AGENT_BIN_ENV);

    let tail = service
        .job_logs("standing-desk", Some(1), None)
        .await
        .unwrap();
    assert_eq!(tail.lines().count(), 1);
    assert!(tail.contains("finished (exit code 0)"));
}

#[tokio::test]
async fn test_run_unknown_job_is_not_found() {
    let root = TempDir::new().unwrap();
    let (service, _, _) = launchd_service(root.path());

    let err = service.run_job_now("missing", None).await.unwrap_err();
    assert!(matches!(err, reprise::OpsError::UnknownJob(_)));
}
