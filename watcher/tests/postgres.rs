//! Postgres repository and advisory lock tests.
//!
//! Run against a disposable database by setting `WATCHER_TEST_DATABASE_URL`;
//! every test returns early without it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rollout_watcher::lock::{Locker, PostgresLocker};
use rollout_watcher::store::repository::ABORTED_REASON;
use rollout_watcher::store::{PostgresTaskRepository, StoreError, TaskQuery, TaskRepository};
use rollout_watcher::task::{Image, NewTask, TaskId, TaskStatus};
use uuid::Uuid;

async fn repository() -> anyhow::Result<Option<PostgresTaskRepository>> {
    let Ok(url) = std::env::var("WATCHER_TEST_DATABASE_URL") else {
        eprintln!("WATCHER_TEST_DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let repository = PostgresTaskRepository::connect(&url, 5).await?;
    repository.migrate().await?;
    Ok(Some(repository))
}

/// Application name no other test run shares.
fn unique_app() -> String {
    format!("demo-{}", Uuid::new_v4().simple())
}

fn query_for(app: &str) -> TaskQuery {
    let now = Utc::now();
    TaskQuery::between(now - ChronoDuration::hours(2), now + ChronoDuration::minutes(1)).for_app(app)
}

// =============================================================================
// Repository Tests
// =============================================================================

#[tokio::test]
async fn test_add_and_get_task() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };
    let app = unique_app();

    let task = repository
        .add_task(
            NewTask::new(&app, vec![Image::new("demo/nginx", "v1"), Image::new("demo/api", "v2")])
                .with_author("jane")
                .with_project("shop"),
        )
        .await?;
    let stored = repository.get_task(task.id).await?;

    assert_eq!(stored.id, task.id);
    assert_eq!(stored.app, app);
    assert_eq!(stored.author, "jane");
    assert_eq!(stored.project, "shop");
    assert_eq!(stored.images, task.images);
    assert_eq!(stored.status, TaskStatus::InProgress);
    Ok(())
}

#[tokio::test]
async fn test_set_task_status_advances_updated() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };

    let task = repository
        .add_task(NewTask::new(unique_app(), vec![Image::new("demo/nginx", "v1")]))
        .await?;
    repository
        .set_task_status(task.id, TaskStatus::Failed, "Rollout status \"not synced\"")
        .await?;
    let stored = repository.get_task(task.id).await?;

    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.status_reason, "Rollout status \"not synced\"");
    assert!(stored.updated > stored.created);
    Ok(())
}

#[tokio::test]
async fn test_unknown_task() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };

    let id = TaskId::generate();
    assert!(matches!(
        repository.get_task(id).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        repository.set_task_status(id, TaskStatus::Deployed, "").await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_get_tasks_paginates_newest_first() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };
    let app = unique_app();
    for tag in ["v1", "v2", "v3"] {
        repository
            .add_task(NewTask::new(&app, vec![Image::new("demo/nginx", tag)]))
            .await?;
    }

    let page = repository.get_tasks(&query_for(&app).paginate(2, 1)).await?;

    assert_eq!(page.total, 3);
    assert_eq!(page.tasks.len(), 2);
    assert!(page.tasks[0].created >= page.tasks[1].created);
    assert_eq!(page.tasks[1].images[0].tag, "v1");
    Ok(())
}

#[tokio::test]
async fn test_sweep_removes_and_aborts_stale_tasks() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };
    let app = unique_app();
    let images = vec![Image::new("demo/nginx", "v1")];

    let orphan = repository.add_task(NewTask::new(&app, images.clone())).await?;
    let missing = repository.add_task(NewTask::new(&app, images.clone())).await?;
    repository
        .set_task_status(missing.id, TaskStatus::AppNotFound, "not found")
        .await?;
    let fresh = repository.add_task(NewTask::new(&app, images)).await?;

    sqlx::query("UPDATE tasks SET created = created - INTERVAL '1 hour' WHERE id = ANY($1)")
        .bind(vec![orphan.id.as_uuid(), missing.id.as_uuid()])
        .execute(repository.pool())
        .await?;

    let report = repository
        .sweep_obsolete_tasks(Duration::from_secs(30 * 60))
        .await?;
    assert!(report.removed >= 1);
    assert!(report.aborted >= 1);

    let orphan = repository.get_task(orphan.id).await?;
    assert_eq!(orphan.status, TaskStatus::Aborted);
    assert_eq!(orphan.status_reason, ABORTED_REASON);
    assert!(matches!(
        repository.get_task(missing.id).await,
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(
        repository.get_task(fresh.id).await?.status,
        TaskStatus::InProgress
    );
    Ok(())
}

#[tokio::test]
async fn test_check() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };
    assert!(repository.check().await);
    Ok(())
}

// =============================================================================
// Advisory Lock Tests
// =============================================================================

#[tokio::test]
async fn test_advisory_lock_serializes_sections() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };
    let locker = Arc::new(PostgresLocker::new(repository.pool().clone()));
    let key = unique_app();
    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let locker = locker.clone();
        let key = key.clone();
        let inside = inside.clone();
        let overlaps = overlaps.clone();
        handles.push(tokio::spawn(async move {
            locker
                .with_lock(
                    &key,
                    Box::pin(async move {
                        if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_advisory_lock_returns_section_error() -> anyhow::Result<()> {
    let Some(repository) = repository().await? else {
        return Ok(());
    };
    let locker = PostgresLocker::new(repository.pool().clone());
    let key = unique_app();

    let failed = locker
        .with_lock(&key, Box::pin(async { Err(anyhow::anyhow!("push rejected")) }))
        .await;
    assert!(failed.is_err());

    // the lock was released despite the failure
    locker.with_lock(&key, Box::pin(async { Ok(()) })).await?;
    Ok(())
}
