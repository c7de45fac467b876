//! GitOps mutation settings.

use std::path::PathBuf;

use serde::Deserialize;

use crate::gitops::GitCliConfig;
use crate::rollout::BackoffConfig;

/// Git identity, credentials and retry budget.
#[derive(Debug, Deserialize, Clone)]
pub struct GitSettings {
    /// Enables GitOps mutation of managed applications.
    #[serde(default)]
    pub enabled: bool,
    /// SSH private key for the GitOps remotes.
    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,
    /// Commit author name.
    #[serde(default = "default_author_name")]
    pub author_name: String,
    /// Commit author email.
    #[serde(default = "default_author_email")]
    pub author_email: String,
    /// Prefix of commit messages.
    #[serde(default = "default_author_name")]
    pub commit_prefix: String,
    /// Attempts per mutation.
    #[serde(default = "default_attempts")]
    pub backoff_attempts: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub backoff_base_delay_ms: u64,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ssh_key_path: None,
            author_name: default_author_name(),
            author_email: default_author_email(),
            commit_prefix: default_author_name(),
            backoff_attempts: default_attempts(),
            backoff_base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl GitSettings {
    /// Settings for the git CLI client.
    #[must_use]
    pub fn cli(&self) -> GitCliConfig {
        GitCliConfig {
            ssh_key_path: self.ssh_key_path.clone(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
        }
    }

    /// Retry schedule of a mutation.
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig {
        BackoffConfig::new()
            .with_max_attempts(self.backoff_attempts)
            .with_base_delay_ms(self.backoff_base_delay_ms)
    }
}

fn default_author_name() -> String {
    "argo-watcher".to_string()
}

fn default_author_email() -> String {
    "argo-watcher@localhost".to_string()
}

const fn default_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}
