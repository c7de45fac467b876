//! Entry point for boundary layers.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::orchestrator::{AdmissionError, Orchestrator};
use crate::rollout::StatusUpdater;
use crate::task::{NewTask, Task};

/// Admits tasks and spawns one rollout observation per admitted task.
#[derive(Clone)]
pub struct RolloutService {
    orchestrator: Arc<Orchestrator>,
    updater: Arc<StatusUpdater>,
}

impl RolloutService {
    /// Creates the service.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator>, updater: Arc<StatusUpdater>) -> Self {
        Self {
            orchestrator,
            updater,
        }
    }

    /// The orchestrator, for listings and health checks.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Admits `task` and starts observing its rollout in the background.
    ///
    /// The returned handle completes once the outcome is persisted; dropping
    /// it does not stop the observation.
    ///
    /// # Errors
    ///
    /// Returns an error if admission fails; nothing is spawned then.
    pub async fn submit(&self, task: NewTask) -> Result<(Task, JoinHandle<()>), AdmissionError> {
        let task = self.orchestrator.add_task(task).await?;
        let handle = self.updater.spawn(task.clone());
        Ok((task, handle))
    }
}
