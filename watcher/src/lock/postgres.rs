//! Fleet-wide locker built on Postgres transaction-scoped advisory locks.
//!
//! The lock is taken with `pg_advisory_xact_lock` inside a transaction and is
//! released by the database when that transaction ends, including when the
//! holder's connection drops.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPool;
use tracing::{debug, warn};

use super::{CriticalSection, LockError, Locker};

/// Maps a key to the 64-bit advisory lock id.
///
/// Uses the first eight bytes of the key's SHA-256 so every instance derives
/// the same id regardless of build or platform.
#[must_use]
pub fn advisory_lock_id(key: &str) -> i64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Locker coordinating every instance that shares one Postgres database.
#[derive(Debug, Clone)]
pub struct PostgresLocker {
    pool: PgPool,
}

impl PostgresLocker {
    /// Creates a locker over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Locker for PostgresLocker {
    async fn with_lock(&self, key: &str, section: CriticalSection<'_>) -> Result<(), LockError> {
        let lock_id = advisory_lock_id(key);
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_id)
            .execute(&mut *tx)
            .await?;
        debug!(key, lock_id, "Advisory lock acquired");

        let outcome = section.await;

        // Ending the transaction releases the lock whatever the section returned.
        if let Err(e) = tx.commit().await {
            warn!(key, error = %e, "Failed to end advisory lock transaction");
            if outcome.is_ok() {
                return Err(LockError::Backend(e));
            }
        }

        outcome.map_err(LockError::Section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_id_is_deterministic() {
        assert_eq!(advisory_lock_id("demo"), advisory_lock_id("demo"));
    }

    #[test]
    fn test_lock_id_differs_per_key() {
        assert_ne!(advisory_lock_id("demo"), advisory_lock_id("demo-2"));
        assert_ne!(advisory_lock_id(""), advisory_lock_id(" "));
    }
}
