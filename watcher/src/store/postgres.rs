//! Postgres-backed task repository.
//!
//! Every operation is a single row-scoped statement, so no application-level
//! locking is layered on top of the database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::repository::{
    ABORTED_REASON, StoreError, SweepReport, TaskPage, TaskQuery, TaskRepository, stale_cutoff,
};
use crate::task::{Image, NewTask, Task, TaskId, TaskStatus};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS tasks (
        id UUID PRIMARY KEY,
        created TIMESTAMPTZ NOT NULL,
        updated TIMESTAMPTZ NOT NULL,
        images JSONB NOT NULL,
        status TEXT NOT NULL,
        app TEXT NOT NULL,
        author TEXT NOT NULL DEFAULT '',
        project TEXT NOT NULL DEFAULT '',
        status_reason TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS tasks_status_idx ON tasks (status)",
    "CREATE INDEX IF NOT EXISTS tasks_created_idx ON tasks (created)",
];

const TASK_COLUMNS: &str = "id, created, updated, images, status, app, author, project, status_reason";

/// Task repository stored in a Postgres `tasks` table.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `url` with at most `max_connections` pooled connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates the `tasks` table and its indexes when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// The underlying pool, shared with the distributed locker.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn task_from_row(row: &PgRow) -> Result<Task, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let images: Json<Vec<Image>> = row.try_get("images")?;
    let status: String = row.try_get("status")?;

    Ok(Task {
        id: TaskId::from(id),
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
        app: row.try_get("app")?,
        author: row.try_get("author")?,
        project: row.try_get("project")?,
        images: images.0,
        status: status.parse()?,
        status_reason: row.try_get("status_reason")?,
        timeout: 0,
        validated: false,
    })
}

fn limit_param(limit: i64) -> Option<i64> {
    (limit > 0).then_some(limit)
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    #[instrument(skip(self, task), fields(app = %task.app))]
    async fn add_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let task = task.into_task(TaskId::generate(), Utc::now());

        sqlx::query(
            "INSERT INTO tasks (id, created, updated, images, status, app, author, project, status_reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(task.id.as_uuid())
        .bind(task.created)
        .bind(task.updated)
        .bind(Json(&task.images))
        .bind(task.status.as_str())
        .bind(&task.app)
        .bind(&task.author)
        .bind(&task.project)
        .bind(&task.status_reason)
        .execute(&self.pool)
        .await?;

        debug!(task_id = %task.id, "Task stored");
        Ok(task)
    }

    #[instrument(skip(self))]
    async fn get_tasks(&self, query: &TaskQuery) -> Result<TaskPage, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks
             WHERE created >= $1 AND created <= $2 AND ($3::TEXT IS NULL OR app = $3)",
        )
        .bind(query.start)
        .bind(query.end)
        .bind(query.app.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE created >= $1 AND created <= $2 AND ($3::TEXT IS NULL OR app = $3)
             ORDER BY created DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(query.start)
        .bind(query.end)
        .bind(query.app.as_deref())
        .bind(limit_param(query.limit))
        .bind(query.offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        let tasks = rows.iter().map(task_from_row).collect::<Result<_, _>>()?;
        Ok(TaskPage {
            tasks,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        task_from_row(&row)
    }

    #[instrument(skip(self, reason))]
    async fn set_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        reason: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tasks
             SET status = $2,
                 status_reason = $3,
                 updated = GREATEST(clock_timestamp(), updated + INTERVAL '1 microsecond')
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    #[instrument(skip(self))]
    async fn sweep_obsolete_tasks(&self, staleness: Duration) -> Result<SweepReport, StoreError> {
        let cutoff: DateTime<Utc> = stale_cutoff(staleness);

        let removed = sqlx::query("DELETE FROM tasks WHERE status = $1 AND created < $2")
            .bind(TaskStatus::AppNotFound.as_str())
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let aborted = sqlx::query(
            "UPDATE tasks
             SET status = $1,
                 status_reason = $2,
                 updated = GREATEST(clock_timestamp(), updated + INTERVAL '1 microsecond')
             WHERE status = $3 AND created < $4",
        )
        .bind(TaskStatus::Aborted.as_str())
        .bind(ABORTED_REASON)
        .bind(TaskStatus::InProgress.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(SweepReport { removed, aborted })
    }
}
