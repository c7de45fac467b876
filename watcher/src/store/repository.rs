//! Task repository contract shared by every storage backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::task::{NewTask, Task, TaskError, TaskId, TaskStatus};

/// Reason written to tasks reclassified by the sweep.
pub const ABORTED_REASON: &str =
    "task was aborted: no status update was received before the staleness threshold";

/// Errors that can occur when using a task repository.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No task matches the identifier.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// Database-related error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row could not be decoded.
    #[error("corrupt task record: {0}")]
    Corrupt(#[from] TaskError),
    /// Stored images could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Filter and pagination for task listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    /// Inclusive lower bound on `created`.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound on `created`.
    pub end: DateTime<Utc>,
    /// Exact application name filter.
    pub app: Option<String>,
    /// Page size; `<= 0` means unbounded.
    pub limit: i64,
    /// Rows to skip after ordering.
    pub offset: i64,
}

impl TaskQuery {
    /// Unbounded query over `[start, end]`.
    #[must_use]
    pub const fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            app: None,
            limit: 0,
            offset: 0,
        }
    }

    /// Restricts the query to one application.
    #[must_use]
    pub fn for_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Sets limit and offset.
    #[must_use]
    pub const fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Whether `task` falls inside the time range and app filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        task.created >= self.start
            && task.created <= self.end
            && self.app.as_deref().is_none_or(|app| task.app == app)
    }
}

/// One page of tasks plus the filtered total before pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPage {
    /// Tasks ordered by `created`, newest first.
    pub tasks: Vec<Task>,
    /// Number of tasks matching the filter.
    pub total: u64,
}

/// Outcome of a single obsolete-task sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale app-not-found tasks deleted.
    pub removed: u64,
    /// Orphaned in-progress tasks reclassified as aborted.
    pub aborted: u64,
}

/// Timing of the background obsolete-task sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    /// Delay between sweeps.
    pub interval: Duration,
    /// Age after which a task is considered obsolete.
    pub staleness: Duration,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            staleness: Duration::from_secs(60 * 60),
        }
    }
}

/// Persistent store for deployment tasks.
///
/// Implementations own the concurrency safety of their storage: every method
/// may be called from any number of workers at once.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Assigns identity and timestamps, sets the status to in progress and stores the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    async fn add_task(&self, task: NewTask) -> Result<Task, StoreError>;

    /// Lists tasks matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn get_tasks(&self, query: &TaskQuery) -> Result<TaskPage, StoreError>;

    /// Fetches one task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no task has this id.
    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;

    /// Updates status, reason and the `updated` timestamp of one task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no task has this id.
    async fn set_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        reason: &str,
    ) -> Result<(), StoreError>;

    /// Lightweight reachability probe.
    async fn check(&self) -> bool;

    /// Runs one obsolete-task pass: deletes app-not-found tasks and aborts
    /// in-progress tasks whose age exceeds `staleness`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the cleanup.
    async fn sweep_obsolete_tasks(&self, staleness: Duration) -> Result<SweepReport, StoreError>;

    /// Periodically sweeps obsolete tasks.
    ///
    /// Runs forever when `retry_budget` is `None`; otherwise stops after that
    /// many sweeps. The first sweep runs immediately. Sweep failures are logged
    /// and never end the loop early.
    async fn process_obsolete_tasks(&self, schedule: SweepSchedule, retry_budget: Option<u32>) {
        let mut ticker = tokio::time::interval(schedule.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut sweeps = 0u32;

        loop {
            if retry_budget.is_some_and(|budget| sweeps >= budget) {
                break;
            }
            ticker.tick().await;
            sweeps = sweeps.saturating_add(1);

            match self.sweep_obsolete_tasks(schedule.staleness).await {
                Ok(report) => info!(
                    removed = report.removed,
                    aborted = report.aborted,
                    "Obsolete task sweep finished"
                ),
                Err(e) => error!(error = %e, "Obsolete task sweep failed"),
            }
        }
    }
}

/// Returns the instant before which a task counts as stale.
pub(crate) fn stale_cutoff(staleness: Duration) -> DateTime<Utc> {
    let staleness = chrono::Duration::from_std(staleness).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(staleness)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Next `updated` value: now, or one microsecond past the previous write when
/// the clock has not advanced.
pub(crate) fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Image;

    fn task_created_at(app: &str, created: DateTime<Utc>) -> Task {
        NewTask::new(app, vec![Image::new("nginx", "v1")]).into_task(TaskId::generate(), created)
    }

    #[test]
    fn test_query_matches_range_inclusively() {
        let now = Utc::now();
        let query = TaskQuery::between(now - chrono::Duration::hours(1), now);
        assert!(query.matches(&task_created_at("a", now)));
        assert!(query.matches(&task_created_at("a", now - chrono::Duration::hours(1))));
        assert!(!query.matches(&task_created_at("a", now + chrono::Duration::seconds(1))));
    }

    #[test]
    fn test_query_app_filter_is_exact() {
        let now = Utc::now();
        let query = TaskQuery::between(now - chrono::Duration::hours(1), now).for_app("demo");
        assert!(query.matches(&task_created_at("demo", now)));
        assert!(!query.matches(&task_created_at("demo-2", now)));
    }

    #[test]
    fn test_next_update_time_strictly_increases() {
        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(next_update_time(future) > future);
        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(next_update_time(past) > past);
    }

    #[test]
    fn test_stale_cutoff_is_in_the_past() {
        assert!(stale_cutoff(Duration::from_secs(60)) < Utc::now());
    }
}
