//! Keyed mutual exclusion for GitOps repository mutations.
//!
//! A [`Locker`] runs a critical section while holding a lock scoped to a
//! string key. The section is passed as an unpolled future, so it cannot
//! start before the lock is held, and the lock is released on every exit
//! path, including a panic unwinding through the section.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

/// In-process locker.
pub mod memory;
/// Postgres advisory-lock locker.
pub mod postgres;

pub use memory::InMemoryLocker;
pub use postgres::PostgresLocker;

/// Work executed while a lock is held.
pub type CriticalSection<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Errors returned by [`Locker::with_lock`].
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock could not be acquired or released.
    #[error("lock backend error: {0}")]
    Backend(#[from] sqlx::Error),
    /// The critical section itself failed.
    #[error(transparent)]
    Section(anyhow::Error),
}

/// Mutual exclusion keyed by an arbitrary string.
#[async_trait]
pub trait Locker: Send + Sync {
    /// Waits for the lock on `key`, runs `section`, then releases the lock.
    ///
    /// Blocks until the lock is available; the wait is not cancellable.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Section`] carrying the section's error, or
    /// [`LockError::Backend`] if the lock itself failed.
    async fn with_lock(&self, key: &str, section: CriticalSection<'_>) -> Result<(), LockError>;
}
