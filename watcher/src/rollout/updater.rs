//! The rollout state machine.
//!
//! One [`StatusUpdater::wait_for_rollout`] execution runs per admitted task:
//! fetch the application once, remember its image set, optionally write the
//! GitOps override, then poll until the rollout converges, regresses or runs
//! out of attempts. The outcome is persisted and announced; nothing is
//! returned to the caller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::check::{CheckOptions, Observation, PendingReason, RolloutCheck, check_rollout, images_hash};
use super::report::{HealthReport, RolloutFailure, RolloutOutcome, SyncReport};
use super::retry::PollPolicy;
use crate::argo::{Application, ArgoApi};
use crate::gitops::GitConfigUpdater;
use crate::infrastructure::metrics::MetricsSink;
use crate::notify::Notifier;
use crate::store::TaskRepository;
use crate::task::Task;

/// Tuning of the state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutSettings {
    /// Polling schedule for tasks without a timeout.
    pub poll: PollPolicy,
    /// Classification knobs.
    pub check: CheckOptions,
}

/// Keeps the in-progress gauge balanced on every exit path.
struct InProgress<'a>(&'a dyn MetricsSink);

impl<'a> InProgress<'a> {
    fn enter(metrics: &'a dyn MetricsSink) -> Self {
        metrics.add_in_progress_task();
        Self(metrics)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.remove_in_progress_task();
    }
}

/// Observes rollouts and records their outcome.
pub struct StatusUpdater {
    argo: Arc<dyn ArgoApi>,
    repository: Arc<dyn TaskRepository>,
    metrics: Arc<dyn MetricsSink>,
    notifier: Notifier,
    git: Option<GitConfigUpdater>,
    settings: RolloutSettings,
}

impl StatusUpdater {
    /// Creates an updater with default settings, no notifications and no
    /// GitOps mutation.
    #[must_use]
    pub fn new(
        argo: Arc<dyn ArgoApi>,
        repository: Arc<dyn TaskRepository>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            argo,
            repository,
            metrics,
            notifier: Notifier::new(),
            git: None,
            settings: RolloutSettings::default(),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: RolloutSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the notifier announcing start and end of each rollout.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Enables GitOps mutation for managed applications.
    #[must_use]
    pub fn with_git_updater(mut self, git: GitConfigUpdater) -> Self {
        self.git = Some(git);
        self
    }

    /// Runs [`Self::wait_for_rollout`] on a new tokio task.
    pub fn spawn(self: &Arc<Self>, task: Task) -> JoinHandle<()> {
        let updater = Arc::clone(self);
        tokio::spawn(async move { updater.wait_for_rollout(task).await })
    }

    /// Observes the rollout of `task` to its end and persists the outcome.
    #[instrument(skip_all, fields(app = %task.app, task_id = %task.id))]
    pub async fn wait_for_rollout(&self, mut task: Task) {
        let _in_progress = InProgress::enter(self.metrics.as_ref());
        self.notify(&task).await;

        let outcome = self.observe(&task).await;
        match &outcome {
            RolloutOutcome::Deployed => {
                info!("Rollout finished");
                self.metrics.reset_failed_deployment(&task.app);
            }
            RolloutOutcome::Failed(failure) => {
                warn!(status = %failure.status(), "Rollout failed");
                self.metrics.add_failed_deployment(&task.app);
            }
        }

        let (status, reason) = outcome.into_status();
        if let Err(e) = self
            .repository
            .set_task_status(task.id, status, &reason)
            .await
        {
            error!(error = %e, %status, "Failed to persist rollout outcome");
        }
        task.status = status;
        task.status_reason = reason;

        self.notify(&task).await;
    }

    /// Runs the state machine for `task` and returns its outcome without
    /// persisting it.
    pub async fn observe(&self, task: &Task) -> RolloutOutcome {
        let app = match self.argo.get_application(&task.app).await {
            Ok(app) => app,
            Err(e) => {
                warn!(error = %e, "Initial application fetch failed");
                return RolloutOutcome::Failed(RolloutFailure::Api(e));
            }
        };
        let baseline = images_hash(app.images());
        debug!(baseline = %baseline, "Captured deployed image baseline");

        if let Some(git) = &self.git
            && let Err(e) = git.update_if_needed(&app, task).await
        {
            error!(error = %e, "GitOps update failed");
            return RolloutOutcome::Failed(RolloutFailure::GitOps(e.to_string()));
        }

        self.poll(task, &baseline).await
    }

    async fn poll(&self, task: &Task, baseline: &str) -> RolloutOutcome {
        let policy = self.settings.poll.for_timeout(task.timeout);
        let attempts = policy.attempts.max(1);
        let mut last: Option<(PendingReason, Application)> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(policy.delay).await;
            }

            let app = match self.argo.get_application(&task.app).await {
                Ok(app) => app,
                Err(e) => {
                    warn!(attempt, error = %e, "Application fetch failed");
                    return RolloutOutcome::Failed(RolloutFailure::Api(e));
                }
            };

            if app.watcher_annotations().fire_and_forget {
                info!("Fire-and-forget application, skipping convergence checks");
                return RolloutOutcome::Deployed;
            }

            match check_rollout(
                &task.images,
                Observation::from(&app),
                baseline,
                &self.settings.check,
            ) {
                RolloutCheck::Deployed => return RolloutOutcome::Deployed,
                RolloutCheck::Regressed => {
                    return RolloutOutcome::Failed(RolloutFailure::Degraded(
                        HealthReport::from_application(&app),
                    ));
                }
                RolloutCheck::Pending(reason) => {
                    debug!(attempt, attempts, ?reason, "Rollout not finished yet");
                    last = Some((reason, app));
                }
            }
        }

        match last {
            Some((reason, app)) => RolloutOutcome::Failed(exhausted(reason, &app, task)),
            None => RolloutOutcome::Deployed,
        }
    }

    async fn notify(&self, task: &Task) {
        if let Err(e) = self.notifier.send(task).await {
            warn!(error = %e, status = %task.status, "Notification failed");
        }
    }
}

/// Failure reported when the budget ran out on a pending classification.
fn exhausted(reason: PendingReason, app: &Application, task: &Task) -> RolloutFailure {
    match reason {
        PendingReason::NotAvailable => RolloutFailure::NotAvailable {
            current: app.images().to_vec(),
            expected: task.expected_images(),
        },
        PendingReason::NotSynced => RolloutFailure::NotSynced(SyncReport::from_application(app)),
        PendingReason::DegradedUnchanged | PendingReason::NotHealthy => {
            RolloutFailure::NotHealthy(HealthReport::from_application(app))
        }
    }
}
