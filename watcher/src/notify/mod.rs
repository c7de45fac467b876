//! Task notifications.
//!
//! A [`Notifier`] fans a task out to every registered
//! [`NotificationStrategy`] concurrently. Failures are collected into one
//! [`NotifyError::Partial`] and never stop the other strategies.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::debug;

use crate::task::Task;

/// Webhook delivery.
pub mod webhook;

pub use webhook::{WebhookConfig, WebhookStrategy};

/// Errors that can occur while notifying.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be delivered.
    #[error("request failed: {0}")]
    Request(String),
    /// The receiver answered with a code outside the allowed list.
    #[error("unexpected response code {0}")]
    UnexpectedStatus(u16),
    /// One or more strategies failed.
    #[error("notification failed: {}", .0.join("; "))]
    Partial(Vec<String>),
}

/// A channel tasks can be reported through.
#[async_trait]
pub trait NotificationStrategy: Send + Sync {
    /// Short name used in error reports.
    fn name(&self) -> &str;

    /// Delivers the current state of `task`.
    async fn send(&self, task: &Task) -> Result<(), NotifyError>;
}

/// Aggregate of notification strategies.
#[derive(Default, Clone)]
pub struct Notifier {
    strategies: Vec<Arc<dyn NotificationStrategy>>,
}

impl Notifier {
    /// Creates a notifier with no strategies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn NotificationStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Returns `true` if no strategy is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Sends `task` through every strategy.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Partial`] naming every strategy that failed.
    pub async fn send(&self, task: &Task) -> Result<(), NotifyError> {
        if self.strategies.is_empty() {
            return Ok(());
        }

        let results = join_all(self.strategies.iter().map(|s| s.send(task))).await;
        let failures: Vec<String> = self
            .strategies
            .iter()
            .zip(results)
            .filter_map(|(strategy, result)| {
                result.err().map(|e| format!("{}: {e}", strategy.name()))
            })
            .collect();

        if failures.is_empty() {
            debug!(task_id = %task.id, status = %task.status, "Notifications delivered");
            Ok(())
        } else {
            Err(NotifyError::Partial(failures))
        }
    }
}
