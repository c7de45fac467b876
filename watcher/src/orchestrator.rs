//! Task admission, listing and health checks.
//!
//! The [`Orchestrator`] is what the boundary layer talks to: it refuses tasks
//! while the store or Argo CD is unhealthy, validates and persists admitted
//! tasks, and serves listings with partial-failure semantics.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::argo::{ArgoApi, ArgoApiError};
use crate::infrastructure::audit::{AuditEvent, log_audit};
use crate::infrastructure::metrics::MetricsSink;
use crate::store::{StoreError, TaskQuery, TaskRepository};
use crate::task::{NewTask, Task, TaskError, TaskId};

/// Status reported by a healthy [`Orchestrator::check`].
pub const STATUS_UP: &str = "up";

/// Why the system is not healthy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// The task store did not answer.
    #[error("task store is unavailable")]
    StoreUnavailable,
    /// Argo CD could not be reached.
    #[error("ArgoCD is unavailable: {0}")]
    ArgoUnavailable(String),
    /// Argo CD rejected the configured token.
    #[error("ArgoCD session is not authenticated")]
    ArgoUnauthenticated,
}

/// Why a task was not admitted.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The system is unhealthy.
    #[error(transparent)]
    Unhealthy(#[from] CheckError),
    /// The task failed validation.
    #[error(transparent)]
    Invalid(#[from] TaskError),
    /// The store rejected the task.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A task listing, possibly annotated with a health error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListing {
    /// Tasks found, newest first.
    pub tasks: Vec<Task>,
    /// Filtered total before pagination.
    pub total: u64,
    /// Set when the listing is partial or the system is unhealthy.
    pub error: Option<String>,
}

/// Admits tasks and reports system health.
pub struct Orchestrator {
    repository: Arc<dyn TaskRepository>,
    argo: Arc<dyn ArgoApi>,
    metrics: Arc<dyn MetricsSink>,
}

impl Orchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        argo: Arc<dyn ArgoApi>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            repository,
            argo,
            metrics,
        }
    }

    /// Checks the store and the Argo CD session.
    ///
    /// Updates the Argo CD availability gauge as a side effect.
    ///
    /// # Errors
    ///
    /// Returns the first failing dependency, the store taking precedence.
    pub async fn check(&self) -> Result<&'static str, CheckError> {
        let argo = match self.argo.get_user_info().await {
            Ok(info) if info.logged_in => Ok(()),
            Ok(_) | Err(ArgoApiError::Unauthorized(_)) => Err(CheckError::ArgoUnauthenticated),
            Err(e) => Err(CheckError::ArgoUnavailable(e.to_string())),
        };
        self.metrics
            .set_argo_unavailable(matches!(argo, Err(CheckError::ArgoUnavailable(_))));

        if !self.repository.check().await {
            return Err(CheckError::StoreUnavailable);
        }
        argo.map(|()| STATUS_UP)
    }

    /// Validates and persists a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the system is unhealthy, the task is invalid or
    /// the store rejects it. Nothing is persisted in those cases.
    #[instrument(skip_all, fields(app = %task.app))]
    pub async fn add_task(&self, task: NewTask) -> Result<Task, AdmissionError> {
        if let Err(e) = self.check().await {
            warn!(error = %e, "Refusing task while unhealthy");
            return Err(e.into());
        }

        if let Err(e) = task.validate() {
            log_audit(&AuditEvent::TaskRejected {
                app: task.app.clone(),
                author: task.author.clone(),
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        let task = self.repository.add_task(task).await?;
        self.metrics.add_processed_deployment(&task.app);
        info!(task_id = %task.id, "Task admitted");
        Ok(task)
    }

    /// Lists tasks.
    ///
    /// Never fails: an unhealthy system or a failing query is reported in
    /// [`TaskListing::error`] next to whatever tasks were found.
    pub async fn get_tasks(&self, query: &TaskQuery) -> TaskListing {
        let health = self.check().await.err();
        match self.repository.get_tasks(query).await {
            Ok(page) => TaskListing {
                tasks: page.tasks,
                total: page.total,
                error: health.map(|e| e.to_string()),
            },
            Err(e) => TaskListing {
                error: Some(e.to_string()),
                ..TaskListing::default()
            },
        }
    }

    /// Fetches one task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.repository.get_task(id).await
    }
}
