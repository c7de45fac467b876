//! Rollout polling settings.

use std::time::Duration;

use serde::Deserialize;

use crate::rollout::{CheckOptions, PollPolicy, RolloutSettings as Tuning};

/// State machine settings.
#[derive(Debug, Deserialize, Clone)]
pub struct RolloutSettings {
    /// Delay between polls in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Attempts for tasks without a timeout.
    #[serde(default = "default_attempts")]
    pub default_attempts: u32,
    /// Registry proxy images may be pulled through.
    #[serde(default)]
    pub registry_proxy: Option<String>,
    /// Count `Suspended` health as deployed.
    #[serde(default)]
    pub accept_suspended: bool,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
            default_attempts: default_attempts(),
            registry_proxy: None,
            accept_suspended: false,
        }
    }
}

impl RolloutSettings {
    /// Converts to the state machine tuning.
    #[must_use]
    pub fn tuning(&self) -> Tuning {
        Tuning {
            poll: PollPolicy {
                attempts: self.default_attempts,
                delay: Duration::from_secs(self.retry_delay_secs),
            },
            check: CheckOptions {
                registry_proxy: self.registry_proxy.clone().filter(|p| !p.is_empty()),
                accept_suspended: self.accept_suspended,
            },
        }
    }
}

const fn default_retry_delay_secs() -> u64 {
    15
}

const fn default_attempts() -> u32 {
    15
}
