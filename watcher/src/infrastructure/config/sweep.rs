//! Obsolete-task sweep settings.

use std::time::Duration;

use serde::Deserialize;

use crate::store::SweepSchedule;

/// Sweep timing in minutes.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SweepSettings {
    /// Minutes between sweeps.
    #[serde(default = "default_minutes")]
    pub interval_minutes: u64,
    /// Age in minutes after which a task is obsolete.
    #[serde(default = "default_minutes")]
    pub staleness_minutes: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_minutes(),
            staleness_minutes: default_minutes(),
        }
    }
}

impl SweepSettings {
    /// Converts to the repository schedule.
    #[must_use]
    pub const fn schedule(&self) -> SweepSchedule {
        SweepSchedule {
            interval: Duration::from_secs(self.interval_minutes.saturating_mul(60)),
            staleness: Duration::from_secs(self.staleness_minutes.saturating_mul(60)),
        }
    }
}

const fn default_minutes() -> u64 {
    60
}
