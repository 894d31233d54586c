//! Rollback behavior when native scheduler installation fails.

use crate::common::prompt_job;
use reprise::testing::RecordingControl;
use reprise::{
    FsJobStore, JobService, JobStore, LaunchdAdapter, OpsError, Paths, Slug, SystemdAdapter,
    UpdateJob,
};
use std::sync::Arc;
use tempfile::TempDir;

fn service_with_control(
    root: &std::path::Path,
    control: Arc<RecordingControl>,
) -> (JobService, Arc<FsJobStore>, Paths) {
    let paths = Paths::rooted(root);
    let store = Arc::new(FsJobStore::new(paths.jobs_dir()));
    let adapter = Arc::new(LaunchdAdapter::new(paths.clone(), control));
    (
        JobService::new(store.clone(), adapter, paths.clone()),
        store,
        paths,
    )
}

#[tokio::test]
async fn test_create_rolls_back_record_when_load_fails() {
    let root = TempDir::new().unwrap();
    let (service, store, paths) =
        service_with_control(root.path(), Arc::new(RecordingControl::failing_on("load")));

    let err = service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap_err();

    assert!(matches!(err, OpsError::Install(_)));
    let slug = Slug::new("standing-desk");
    assert!(store.get(&slug).await.unwrap().is_none());
    assert!(!paths.job_file(&slug).exists());
}

#[tokio::test]
async fn test_update_restores_record_and_unit_on_failure() {
    let root = TempDir::new().unwrap();
    let (good, store, paths) =
        service_with_control(root.path(), Arc::new(RecordingControl::new()));
    good.create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    let (failing, _, _) =
        service_with_control(root.path(), Arc::new(RecordingControl::failing_on("load")));
    let err = failing
        .update_job(
            "standing-desk",
            UpdateJob {
                schedule: Some("30 14 * * *".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Install(_)));

    // Record restored to the prior schedule.
    let slug = Slug::new("standing-desk");
    let record = store.get(&slug).await.unwrap().unwrap();
    assert_eq!(record.schedule, "0 9 * * *");

    // Prior unit content restored (best-effort write happens before the
    // failing load).
    let plist = std::fs::read_to_string(paths.plist_file(&slug)).unwrap();
    assert!(plist.contains("<integer>9</integer>"));
}

#[tokio::test]
async fn test_invalid_update_leaves_everything_untouched() {
    let root = TempDir::new().unwrap();
    let (service, store, _) =
        service_with_control(root.path(), Arc::new(RecordingControl::new()));
    service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    let err = service
        .update_job(
            "standing-desk",
            UpdateJob {
                schedule: Some("not a cron".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Cron(_)));

    let record = store.get(&Slug::new("standing-desk")).await.unwrap().unwrap();
    assert_eq!(record.schedule, "0 9 * * *");
}

#[tokio::test]
async fn test_systemd_enable_failure_rolls_back_create() {
    let root = TempDir::new().unwrap();
    let paths = Paths::rooted(root.path());
    let store = Arc::new(FsJobStore::new(paths.jobs_dir()));
    let adapter = Arc::new(SystemdAdapter::new(
        paths.clone(),
        Arc::new(RecordingControl::failing_on("enable")),
    ));
    let service = JobService::new(store.clone(), adapter, paths);

    let err = service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Install(_)));
    assert!(store.list().await.unwrap().is_empty());
}
