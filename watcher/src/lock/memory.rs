//! In-process locker: one async mutex per key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{CriticalSection, LockError, Locker};

/// Locker serializing sections within a single process.
///
/// Per-key mutexes are created on first use and never removed; the key set is
/// bounded by the number of distinct applications. The table lock is held
/// only while looking up a handle, never during a critical section.
#[derive(Debug, Default)]
pub struct InMemoryLocker {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InMemoryLocker {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Number of keys seen so far.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.locks.lock().len()
    }
}

#[async_trait]
impl Locker for InMemoryLocker {
    async fn with_lock(&self, key: &str, section: CriticalSection<'_>) -> Result<(), LockError> {
        let handle = self.handle(key);
        let _guard = handle.lock().await;
        trace!(key, "Lock acquired");
        section.await.map_err(LockError::Section)
    }
}
