//! Rollout observation.
//!
//! [`check`] holds the pure classification, [`retry`] the attempt budgets,
//! [`report`] the terminal outcomes and [`updater`] the state machine tying
//! them to the control plane and the task store.

pub mod check;
pub mod report;
pub mod retry;
pub mod updater;

pub use check::{CheckOptions, PendingReason, RolloutCheck, check_rollout, images_hash};
pub use report::{RolloutFailure, RolloutOutcome};
pub use retry::{BackoffConfig, PollPolicy};
pub use updater::{RolloutSettings, StatusUpdater};
