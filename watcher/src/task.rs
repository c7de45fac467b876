//! Deployment task domain types.
//!
//! A task is a request to observe one application until it converges on a
//! set of expected container images. [`NewTask`] is what callers submit;
//! [`Task`] is the persisted record with identity and lifecycle fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task identifier, assigned once by the repository at persistence time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TaskId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A container image and the tag expected to be rolled out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    /// Image repository, e.g. `ghcr.io/org/app`.
    pub image: String,
    /// Expected tag.
    pub tag: String,
}

impl Image {
    /// Creates a new image reference.
    pub fn new(image: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.image, self.tag)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Rollout is being observed.
    #[default]
    #[serde(rename = "in progress")]
    InProgress,
    /// Application converged on the expected images.
    #[serde(rename = "deployed")]
    Deployed,
    /// Rollout failed; the reason carries the diagnostic.
    #[serde(rename = "failed")]
    Failed,
    /// The application does not exist on the control plane.
    #[serde(rename = "app not found")]
    AppNotFound,
    /// Observation was orphaned and reclassified by the obsolete-task sweep.
    #[serde(rename = "aborted")]
    Aborted,
    /// The control plane refused the connection.
    #[serde(rename = "ArgoCD is unavailable")]
    ArgoUnavailable,
}

impl TaskStatus {
    /// Persisted string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in progress",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::AppNotFound => "app not found",
            Self::Aborted => "aborted",
            Self::ArgoUnavailable => "ArgoCD is unavailable",
        }
    }

    /// Returns `true` once no further status transition is expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in progress" => Ok(Self::InProgress),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            "app not found" => Ok(Self::AppNotFound),
            "aborted" => Ok(Self::Aborted),
            "ArgoCD is unavailable" => Ok(Self::ArgoUnavailable),
            other => Err(TaskError::UnknownStatus(other.to_string())),
        }
    }
}

/// Task-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Submitted task failed admission validation.
    #[error("invalid task: {0}")]
    Validation(String),
    /// A stored status string is not recognised.
    #[error("unknown task status: {0}")]
    UnknownStatus(String),
}

/// A deployment task as submitted by a caller, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Application name on the control plane.
    pub app: String,
    /// Who triggered the deployment.
    #[serde(default)]
    pub author: String,
    /// Project the deployment belongs to.
    #[serde(default)]
    pub project: String,
    /// Expected images, in submission order.
    pub images: Vec<Image>,
    /// Observation budget in seconds; `0` selects the default attempt budget.
    #[serde(default)]
    pub timeout: i64,
    /// Whether the submitter is allowed to trigger GitOps mutations.
    #[serde(default)]
    pub validated: bool,
}

impl NewTask {
    /// Creates a task request for `app` expecting `images`.
    pub fn new(app: impl Into<String>, images: Vec<Image>) -> Self {
        Self {
            app: app.into(),
            images,
            ..Self::default()
        }
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: i64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks the task as validated for GitOps mutation.
    #[must_use]
    pub const fn validated(mut self, validated: bool) -> Self {
        self.validated = validated;
        self
    }

    /// Checks the admission rules: a non-empty app and at least one image.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.app.trim().is_empty() {
            return Err(TaskError::Validation("app must not be empty".to_string()));
        }
        if self.images.is_empty() {
            return Err(TaskError::Validation(
                "images must contain at least one entry".to_string(),
            ));
        }
        if let Some(image) = self
            .images
            .iter()
            .find(|i| i.image.trim().is_empty() || i.tag.trim().is_empty())
        {
            return Err(TaskError::Validation(format!(
                "image reference '{image}' is incomplete"
            )));
        }
        Ok(())
    }

    /// Turns the request into a persisted record stamped at `now`.
    #[must_use]
    pub fn into_task(self, id: TaskId, now: DateTime<Utc>) -> Task {
        Task {
            id,
            created: now,
            updated: now,
            app: self.app,
            author: self.author,
            project: self.project,
            images: self.images,
            status: TaskStatus::InProgress,
            status_reason: String::new(),
            timeout: self.timeout,
            validated: self.validated,
        }
    }
}

/// A persisted deployment task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Immutable identifier.
    pub id: TaskId,
    /// Admission time.
    pub created: DateTime<Utc>,
    /// Last status write.
    pub updated: DateTime<Utc>,
    /// Application name.
    pub app: String,
    /// Deployment author.
    pub author: String,
    /// Project name.
    pub project: String,
    /// Expected images.
    pub images: Vec<Image>,
    /// Current status.
    pub status: TaskStatus,
    /// Diagnostic text; empty while in progress and on success.
    pub status_reason: String,
    /// Observation budget in seconds (`0` = default).
    #[serde(default)]
    pub timeout: i64,
    /// Whether GitOps mutation was authorised.
    #[serde(default)]
    pub validated: bool,
}

impl Task {
    /// Expected images rendered as `image:tag`.
    #[must_use]
    pub fn expected_images(&self) -> Vec<String> {
        self.images.iter().map(ToString::to_string).collect()
    }
}
