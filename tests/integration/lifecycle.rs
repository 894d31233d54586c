//! End-to-end job lifecycle against the filesystem store.

use crate::common::{launchd_service, prompt_job, systemd_service};
use reprise::{daemon_calendars, timer_calendars, JobStore, UpdateJob};
use tempfile::TempDir;

#[tokio::test]
async fn test_create_standing_desk_end_to_end() {
    let root = TempDir::new().unwrap();
    let (service, store, paths) = launchd_service(root.path());

    let job = service
        .create_job(prompt_job(
            "Standing Desk",
            "0 9 * * *",
            "Remind me to stand up",
        ))
        .await
        .unwrap();

    assert_eq!(job.slug.as_str(), "standing-desk");

    // Record on disk, readable back through the trait.
    assert!(paths.job_file(&job.slug).exists());
    let stored = store.get(&job.slug).await.unwrap().unwrap();
    assert_eq!(stored.name, "Standing Desk");
    assert_eq!(stored.schedule, "0 9 * * *");

    // Compiled calendar: one entry at hour 9, minute 0.
    let calendars = daemon_calendars(&job.schedule).unwrap();
    assert_eq!(calendars.len(), 1);
    assert_eq!(calendars[0].hour, Some(9));
    assert_eq!(calendars[0].minute, Some(0));
    assert_eq!(calendars[0].day, None);

    assert_eq!(
        timer_calendars(&job.schedule).unwrap(),
        vec!["* *-*-* 09:00:00".to_string()]
    );

    // Installed plist carries the label and the prompt.
    let plist = std::fs::read_to_string(paths.plist_file(&job.slug)).unwrap();
    assert!(plist.contains("com.reprise.standing-desk"));
    assert!(plist.contains("Remind me to stand up"));
}

#[tokio::test]
async fn test_create_is_readable_back_identically() {
    let root = TempDir::new().unwrap();
    let (service, store, _) = launchd_service(root.path());

    let created = service
        .create_job(prompt_job("Daily Digest", "30 7 * * *", "Summarize my inbox"))
        .await
        .unwrap();
    let read = store.get(&created.slug).await.unwrap().unwrap();

    assert_eq!(read.slug, created.slug);
    assert_eq!(read.name, created.name);
    assert_eq!(read.schedule, created.schedule);
    assert_eq!(read.run, created.run);
    assert_eq!(read.workdir, created.workdir);
}

#[tokio::test]
async fn test_systemd_units_written_and_removed() {
    let root = TempDir::new().unwrap();
    let (service, _, paths) = systemd_service(root.path());

    let job = service
        .create_job(prompt_job("Weekly Review", "0 17 * * 5", "Review the week"))
        .await
        .unwrap();

    let timer = std::fs::read_to_string(paths.timer_file(&job.slug)).unwrap();
    assert!(timer.contains("OnCalendar=Fri *-*-* 17:00:00"));
    assert!(timer.contains("Persistent=true"));
    let service_unit = std::fs::read_to_string(paths.service_file(&job.slug)).unwrap();
    assert!(service_unit.contains("Type=oneshot"));
    assert!(service_unit.contains("'Review the week'"));

    service.delete_job("weekly-review").await.unwrap();
    assert!(!paths.timer_file(&job.slug).exists());
    assert!(!paths.service_file(&job.slug).exists());
}

#[tokio::test]
async fn test_update_rerenders_unit() {
    let root = TempDir::new().unwrap();
    let (service, _, paths) = launchd_service(root.path());

    let job = service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    service
        .update_job(
            "standing-desk",
            UpdateJob {
                schedule: Some("30 14 * * *".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let plist = std::fs::read_to_string(paths.plist_file(&job.slug)).unwrap();
    assert!(plist.contains("<integer>14</integer>"));
    assert!(plist.contains("<integer>30</integer>"));
}

#[tokio::test]
async fn test_delete_keeps_log_file() {
    let root = TempDir::new().unwrap();
    let (service, store, paths) = launchd_service(root.path());

    let job = service
        .create_job(prompt_job("Standing Desk", "0 9 * * *", "Stand up"))
        .await
        .unwrap();

    let log = paths.log_file(&job.slug);
    std::fs::create_dir_all(log.parent().unwrap()).unwrap();
    std::fs::write(&log, "old output\n").unwrap();

    service.delete_job("standing-desk").await.unwrap();

    assert!(store.get(&job.slug).await.unwrap().is_none());
    assert!(!paths.plist_file(&job.slug).exists());
    assert!(log.exists());
}

#[tokio::test]
async fn test_source_prefixes_slug_and_filters_list() {
    let root = TempDir::new().unwrap();
    let (service, _, _) = launchd_service(root.path());

    let mut input = prompt_job("Posture Check", "0 9 * * *", "Check posture");
    input.source = Some("wellness".to_string());
    let job = service.create_job(input).await.unwrap();
    assert_eq!(job.slug.as_str(), "wellness-posture-check");

    service
        .create_job(prompt_job("Other", "0 9 * * *", "x"))
        .await
        .unwrap();

    let filtered = service.list_jobs(Some("wellness")).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].slug.as_str(), "wellness-posture-check");
}
