//! Task storage settings.

use secrecy::SecretString;
use serde::Deserialize;

/// Which task repository backs the watcher.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process-local; tasks are lost on restart.
    #[default]
    Memory,
    /// Shared Postgres database.
    Postgres,
}

/// Database connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Database connection URL; required for [`StorageKind::Postgres`].
    pub url: Option<SecretString>,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

const fn default_max_connections() -> u32 {
    10
}
