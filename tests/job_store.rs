//! Integration tests for the persistent job store

mod common;

use chrono::Duration as ChronoDuration;
use sea_orm::{ActiveModelTrait, Set};
use common::{create_test_database, open_file_database, utc};
use std::time::Duration;
use tempfile::TempDir;

use podcast_ingest::{
    database::repositories::JobStoreSeaOrmRepository,
    entities::job_definitions,
    job_scheduling::{
        ExecutionOutcome, ExecutionStatus, JobDefinition, JobSchedulingError, JobWork, Trigger,
    },
};

fn feed_job(id: &str, period_secs: u64) -> JobDefinition {
    JobDefinition::new(
        id,
        Trigger::every(Duration::from_secs(period_secs)),
        JobWork::FetchAndIngest {
            source_url: format!("https://feeds.example.com/{id}.xml"),
        },
    )
}

async fn create_store() -> JobStoreSeaOrmRepository {
    let database = create_test_database().await;
    JobStoreSeaOrmRepository::new(database.connection().clone())
}

#[tokio::test]
async fn test_upsert_without_replace_conflicts() {
    let store = create_store().await;
    let now = utc(2026, 10, 5, 9, 0, 0);

    store.upsert_definition(&feed_job("news", 120), now).await.unwrap();

    let duplicate = feed_job("news", 60).with_replace_existing(false);
    let error = store.upsert_definition(&duplicate, now).await.unwrap_err();
    assert!(matches!(error, JobSchedulingError::ConflictingId { ref id } if id == "news"));

    let stored = store.find_definition("news").await.unwrap().unwrap();
    assert_eq!(stored.trigger, Trigger::every(Duration::from_secs(120)));
}

#[tokio::test]
async fn test_replace_keeps_schedule_only_for_same_trigger() {
    let store = create_store().await;
    let now = utc(2026, 10, 5, 9, 0, 0);
    let next = utc(2026, 10, 5, 9, 2, 0);

    store.upsert_definition(&feed_job("news", 120), now).await.unwrap();
    store.update_next_run("news", Some(next)).await.unwrap();

    let replaced = store
        .upsert_definition(&feed_job("news", 120), now + ChronoDuration::hours(1))
        .await
        .unwrap();
    assert_eq!(replaced.next_run_at, Some(next));
    assert_eq!(replaced.created_at, now);

    let rescheduled = store
        .upsert_definition(&feed_job("news", 300), now + ChronoDuration::hours(2))
        .await
        .unwrap();
    assert_eq!(rescheduled.next_run_at, None);
    assert_eq!(rescheduled.trigger, Trigger::every(Duration::from_secs(300)));
}

#[tokio::test]
async fn test_update_next_run_for_unknown_job_fails() {
    let store = create_store().await;
    assert!(
        store
            .update_next_run("ghost", Some(utc(2026, 10, 5, 9, 0, 0)))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_advance_next_run_never_moves_backwards() {
    let store = create_store().await;
    store
        .upsert_definition(&feed_job("news", 120), utc(2026, 10, 5, 9, 0, 0))
        .await
        .unwrap();

    store.advance_next_run("news", utc(2026, 10, 5, 9, 4, 0)).await.unwrap();
    store.advance_next_run("news", utc(2026, 10, 5, 9, 2, 0)).await.unwrap();

    let stored = store.find_definition("news").await.unwrap().unwrap();
    assert_eq!(stored.next_run_at, Some(utc(2026, 10, 5, 9, 4, 0)));
}

#[tokio::test]
async fn test_load_skips_rows_that_cannot_be_decoded() {
    let database = create_test_database().await;
    let store = JobStoreSeaOrmRepository::new(database.connection().clone());
    let now = utc(2026, 10, 5, 9, 0, 0);

    store.upsert_definition(&feed_job("alpha", 120), now).await.unwrap();
    store.upsert_definition(&feed_job("zulu", 300), now).await.unwrap();

    job_definitions::ActiveModel {
        id: Set("broken".to_string()),
        trigger: Set("not json".to_string()),
        work: Set(r#"{"type":"fetch_and_ingest","source_url":"https://x.example/f"}"#.to_string()),
        max_instances: Set(1),
        next_run_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&**database.connection())
    .await
    .unwrap();

    let loaded = store.load_all_definitions().await.unwrap();
    let ids: Vec<&str> = loaded.iter().map(|job| job.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "zulu"]);
}

#[tokio::test]
async fn test_remove_definition() {
    let store = create_store().await;
    store
        .upsert_definition(&feed_job("news", 120), utc(2026, 10, 5, 9, 0, 0))
        .await
        .unwrap();

    assert!(store.remove_definition("news").await.unwrap());
    assert!(!store.remove_definition("news").await.unwrap());
    assert!(store.load_all_definitions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_execution_lifecycle_is_recorded() {
    let store = create_store().await;
    let started = utc(2026, 10, 5, 9, 0, 0);

    let handle = store.record_execution_start("news", started).await.unwrap();
    let running = store.list_executions("news").await.unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].status, ExecutionStatus::Running);
    assert_eq!(running[0].finished_at, None);

    store
        .record_execution_end(
            &handle,
            &ExecutionOutcome::succeeded("added=2 skipped=0 failed=0"),
            started + ChronoDuration::milliseconds(1500),
        )
        .await
        .unwrap();

    let executions = store.list_executions("news").await.unwrap();
    assert_eq!(executions.len(), 1);
    let execution = &executions[0];
    assert_eq!(execution.id, handle.id);
    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    assert_eq!(execution.duration_ms, Some(1500));
    assert_eq!(
        execution.detail.as_deref(),
        Some("added=2 skipped=0 failed=0")
    );
}

#[tokio::test]
async fn test_prune_keeps_only_recent_executions() {
    let store = create_store().await;
    let now = utc(2026, 10, 17, 0, 0, 0);

    for age_days in [1, 8, 30] {
        let finished = now - ChronoDuration::days(age_days);
        let handle = store
            .record_execution_start("news", finished - ChronoDuration::seconds(5))
            .await
            .unwrap();
        store
            .record_execution_end(&handle, &ExecutionOutcome::succeeded("ok"), finished)
            .await
            .unwrap();
    }

    let seven_days = Duration::from_secs(7 * 24 * 60 * 60);
    let deleted = store.delete_executions_older_than(seven_days, now).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining = store.list_executions("news").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(
        remaining[0].finished_at,
        Some(now - ChronoDuration::days(1))
    );

    // Nothing left to delete on a second pass
    assert_eq!(
        store.delete_executions_older_than(seven_days, now).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_prune_removes_stale_unfinished_executions() {
    let store = create_store().await;
    let now = utc(2026, 10, 17, 0, 0, 0);

    store
        .record_execution_start("news", now - ChronoDuration::days(10))
        .await
        .unwrap();
    store
        .record_execution_start("news", now - ChronoDuration::hours(1))
        .await
        .unwrap();

    let deleted = store
        .delete_executions_older_than(Duration::from_secs(7 * 24 * 60 * 60), now)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.list_executions("news").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_definitions_and_history_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("jobs.db");
    let now = utc(2026, 10, 5, 9, 0, 0);
    let next = utc(2026, 10, 5, 9, 2, 0);

    {
        let database = open_file_database(&db_path).await;
        let store = JobStoreSeaOrmRepository::new(database.connection().clone());
        store.upsert_definition(&feed_job("news", 120), now).await.unwrap();
        store.update_next_run("news", Some(next)).await.unwrap();

        let handle = store.record_execution_start("news", now).await.unwrap();
        store
            .record_execution_end(
                &handle,
                &ExecutionOutcome::failed("ingest failed: database is locked"),
                now + ChronoDuration::seconds(2),
            )
            .await
            .unwrap();

        drop(store);
        database.close().await.unwrap();
    }

    let database = open_file_database(&db_path).await;
    let store = JobStoreSeaOrmRepository::new(database.connection().clone());

    // Startup registration replays the same definition
    let persisted = store
        .upsert_definition(&feed_job("news", 120), now + ChronoDuration::minutes(5))
        .await
        .unwrap();
    assert_eq!(persisted.next_run_at, Some(next));

    let all = store.load_all_definitions().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "news");
    assert_eq!(all[0].max_instances, 1);
    assert_eq!(
        all[0].work,
        JobWork::FetchAndIngest {
            source_url: "https://feeds.example.com/news.xml".to_string()
        }
    );

    let history = store.list_executions("news").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
}
