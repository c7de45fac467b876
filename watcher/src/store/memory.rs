//! In-memory task repository.
//!
//! Tasks live in a single map guarded by one reader/writer lock. The lock is
//! held only for the duration of each call; nothing is kept across awaits.
//! State is lost on restart.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use super::repository::{
    ABORTED_REASON, StoreError, SweepReport, TaskPage, TaskQuery, TaskRepository, next_update_time,
    stale_cutoff,
};
use crate::task::{NewTask, Task, TaskId, TaskStatus};

/// Task repository backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns `true` when no task is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: TaskId, age: chrono::Duration) {
        if let Some(task) = self.tasks.write().get_mut(&id) {
            task.created -= age;
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    #[instrument(skip(self, task), fields(app = %task.app))]
    async fn add_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let task = task.into_task(TaskId::generate(), Utc::now());
        self.tasks.write().insert(task.id, task.clone());
        debug!(task_id = %task.id, "Task stored");
        Ok(task)
    }

    async fn get_tasks(&self, query: &TaskQuery) -> Result<TaskPage, StoreError> {
        let mut matching: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|task| query.matches(task))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created.cmp(&a.created));
        let total = matching.len() as u64;

        let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
        let page = matching.into_iter().skip(offset);
        let tasks = if query.limit > 0 {
            page.take(usize::try_from(query.limit).unwrap_or(usize::MAX))
                .collect()
        } else {
            page.collect()
        };

        Ok(TaskPage { tasks, total })
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    #[instrument(skip(self, reason))]
    async fn set_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        task.status = status;
        task.status_reason = reason.to_string();
        task.updated = next_update_time(task.updated);
        Ok(())
    }

    async fn check(&self) -> bool {
        true
    }

    async fn sweep_obsolete_tasks(&self, staleness: Duration) -> Result<SweepReport, StoreError> {
        let cutoff = stale_cutoff(staleness);
        let mut report = SweepReport::default();
        let mut tasks = self.tasks.write();

        tasks.retain(|_, task| {
            let obsolete = task.status == TaskStatus::AppNotFound && task.created < cutoff;
            if obsolete {
                report.removed += 1;
            }
            !obsolete
        });

        for task in tasks.values_mut() {
            if task.status == TaskStatus::InProgress && task.created < cutoff {
                task.status = TaskStatus::Aborted;
                task.status_reason = ABORTED_REASON.to_string();
                task.updated = next_update_time(task.updated);
                report.aborted += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::repository::SweepSchedule;
    use crate::task::Image;
    use std::sync::Arc;

    fn new_task(app: &str) -> NewTask {
        NewTask::new(app, vec![Image::new("nginx", "v1")])
    }

    fn all_time() -> TaskQuery {
        TaskQuery::between(
            Utc::now() - chrono::Duration::days(1),
            Utc::now() + chrono::Duration::days(1),
        )
    }

    #[tokio::test]
    async fn test_add_task_assigns_unique_ids() {
        let repo = InMemoryTaskRepository::new();
        let a = repo.add_task(new_task("demo")).await.unwrap();
        let b = repo.add_task(new_task("demo")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, TaskStatus::InProgress);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_get_task_missing_is_not_found() {
        let repo = InMemoryTaskRepository::new();
        let err = repo.get_task(TaskId::generate()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_tasks_orders_newest_first_and_paginates() {
        let repo = InMemoryTaskRepository::new();
        let oldest = repo.add_task(new_task("a")).await.unwrap();
        let middle = repo.add_task(new_task("b")).await.unwrap();
        let newest = repo.add_task(new_task("c")).await.unwrap();
        repo.backdate(oldest.id, chrono::Duration::minutes(3));
        repo.backdate(middle.id, chrono::Duration::minutes(2));
        repo.backdate(newest.id, chrono::Duration::minutes(1));

        let page = repo.get_tasks(&all_time().paginate(1, 1)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.tasks[0].id, middle.id);

        let unbounded = repo.get_tasks(&all_time()).await.unwrap();
        let ids: Vec<TaskId> = unbounded.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    }

    #[tokio::test]
    async fn test_get_tasks_respects_range_and_app() {
        let repo = InMemoryTaskRepository::new();
        let old = repo.add_task(new_task("demo")).await.unwrap();
        repo.backdate(old.id, chrono::Duration::days(3));
        repo.add_task(new_task("demo")).await.unwrap();
        repo.add_task(new_task("other")).await.unwrap();

        let page = repo.get_tasks(&all_time().for_app("demo")).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(page.tasks.iter().all(|t| t.app == "demo" && t.id != old.id));
    }

    #[tokio::test]
    async fn test_set_task_status_updates_and_bumps_timestamp() {
        let repo = InMemoryTaskRepository::new();
        let task = repo.add_task(new_task("demo")).await.unwrap();

        repo.set_task_status(task.id, TaskStatus::Failed, "boom")
            .await
            .unwrap();
        let first = repo.get_task(task.id).await.unwrap();
        assert_eq!(first.status, TaskStatus::Failed);
        assert_eq!(first.status_reason, "boom");
        assert!(first.updated > task.updated);

        repo.set_task_status(task.id, TaskStatus::Deployed, "")
            .await
            .unwrap();
        let second = repo.get_task(task.id).await.unwrap();
        assert!(second.updated > first.updated);
    }

    #[tokio::test]
    async fn test_set_task_status_missing_is_not_found() {
        let repo = InMemoryTaskRepository::new();
        let result = repo
            .set_task_status(TaskId::generate(), TaskStatus::Deployed, "")
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sweep_removes_and_aborts_only_stale_tasks() {
        let repo = InMemoryTaskRepository::new();
        let stale_missing = repo.add_task(new_task("gone")).await.unwrap();
        let fresh_missing = repo.add_task(new_task("gone")).await.unwrap();
        let stale_running = repo.add_task(new_task("stuck")).await.unwrap();
        let fresh_running = repo.add_task(new_task("running")).await.unwrap();
        let stale_deployed = repo.add_task(new_task("done")).await.unwrap();

        for id in [stale_missing.id, fresh_missing.id] {
            repo.set_task_status(id, TaskStatus::AppNotFound, "missing")
                .await
                .unwrap();
        }
        repo.set_task_status(stale_deployed.id, TaskStatus::Deployed, "")
            .await
            .unwrap();
        for id in [stale_missing.id, stale_running.id, stale_deployed.id] {
            repo.backdate(id, chrono::Duration::hours(2));
        }

        let report = repo
            .sweep_obsolete_tasks(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(report, SweepReport { removed: 1, aborted: 1 });

        assert!(repo.get_task(stale_missing.id).await.is_err());
        assert_eq!(
            repo.get_task(fresh_missing.id).await.unwrap().status,
            TaskStatus::AppNotFound
        );
        let aborted = repo.get_task(stale_running.id).await.unwrap();
        assert_eq!(aborted.status, TaskStatus::Aborted);
        assert!(!aborted.status_reason.is_empty());
        assert_eq!(
            repo.get_task(fresh_running.id).await.unwrap().status,
            TaskStatus::InProgress
        );
        assert_eq!(
            repo.get_task(stale_deployed.id).await.unwrap().status,
            TaskStatus::Deployed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_obsolete_tasks_honours_budget() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let task = repo.add_task(new_task("stuck")).await.unwrap();
        repo.backdate(task.id, chrono::Duration::hours(2));

        let schedule = SweepSchedule {
            interval: Duration::from_secs(60),
            staleness: Duration::from_secs(3600),
        };
        repo.process_obsolete_tasks(schedule, Some(2)).await;

        assert_eq!(
            repo.get_task(task.id).await.unwrap().status,
            TaskStatus::Aborted
        );
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_lose_tasks() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let task = repo.add_task(new_task(&format!("app-{i}"))).await.unwrap();
                repo.set_task_status(task.id, TaskStatus::Deployed, "")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let page = repo.get_tasks(&all_time()).await.unwrap();
        assert_eq!(page.total, 32);
        assert!(page.tasks.iter().all(|t| t.status == TaskStatus::Deployed));
    }
}
