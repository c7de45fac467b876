//! GitOps repository mutation.
//!
//! Managed applications get their image tags written to an Argo CD parameter
//! override file before the rollout is observed. Mutations of one application
//! are serialized through a [`Locker`](crate::lock::Locker).

/// Git access.
pub mod git;
/// Override file model.
pub mod overrides;
/// Repository resolution.
pub mod repo;
/// The updater.
pub mod updater;

pub use git::{Checkout, GitCli, GitCliConfig, GitClient};
pub use overrides::{HelmParameter, OverrideFile};
pub use repo::GitopsRepo;
pub use updater::GitConfigUpdater;

use crate::lock::LockError;

/// Errors that can occur while mutating a GitOps repository.
#[derive(Debug, thiserror::Error)]
pub enum GitOpsError {
    /// Repository URL, branch or path could not be determined.
    #[error("cannot resolve GitOps repository: {0}")]
    Unresolvable(String),
    /// A git command failed.
    #[error("git command failed: {0}")]
    Git(String),
    /// The override file could not be read or written as YAML.
    #[error("invalid override file: {0}")]
    Overrides(#[from] serde_yaml::Error),
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The per-application lock could not be taken.
    #[error("lock error: {0}")]
    Lock(LockError),
}

impl GitOpsError {
    /// Returns `true` if a later attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Git(_) | Self::Io(_))
    }
}

impl From<LockError> for GitOpsError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Section(inner) => match inner.downcast::<Self>() {
                Ok(own) => own,
                Err(other) => Self::Lock(LockError::Section(other)),
            },
            backend @ LockError::Backend(_) => Self::Lock(backend),
        }
    }
}
