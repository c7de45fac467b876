//! Rollout metrics.
//!
//! [`MetricsSink`] is what the core reports to; [`PrometheusMetrics`] forwards
//! to the `metrics` facade, which the binary backs with a Prometheus recorder.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Counter of admitted deployments, labelled by `app`.
pub const PROCESSED_DEPLOYMENTS: &str = "watcher_processed_deployments";
/// Gauge of consecutive failed deployments, labelled by `app`.
pub const FAILED_DEPLOYMENT: &str = "watcher_failed_deployment";
/// Gauge set to 1 while Argo CD is unreachable.
pub const ARGOCD_UNAVAILABLE: &str = "watcher_argocd_unavailable";
/// Gauge of rollouts currently being observed.
pub const IN_PROGRESS_TASKS: &str = "watcher_in_progress_tasks";

/// Metrics reported by the watcher core.
pub trait MetricsSink: Send + Sync {
    /// Counts an admitted deployment.
    fn add_processed_deployment(&self, app: &str);
    /// Records a failed rollout.
    fn add_failed_deployment(&self, app: &str);
    /// Clears the failure gauge after a successful rollout.
    fn reset_failed_deployment(&self, app: &str);
    /// Flags Argo CD reachability.
    fn set_argo_unavailable(&self, unavailable: bool);
    /// A rollout observation started.
    fn add_in_progress_task(&self);
    /// A rollout observation finished.
    fn remove_in_progress_task(&self);
}

/// [`MetricsSink`] backed by the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    /// Registers metric descriptions with the installed recorder.
    #[must_use]
    pub fn new() -> Self {
        describe_counter!(PROCESSED_DEPLOYMENTS, "Deployments admitted for observation");
        describe_gauge!(FAILED_DEPLOYMENT, "Failed deployments since the last success");
        describe_gauge!(ARGOCD_UNAVAILABLE, "Whether Argo CD is unreachable");
        describe_gauge!(IN_PROGRESS_TASKS, "Rollouts currently being observed");
        Self
    }
}

impl MetricsSink for PrometheusMetrics {
    fn add_processed_deployment(&self, app: &str) {
        counter!(PROCESSED_DEPLOYMENTS, "app" => app.to_string()).increment(1);
    }

    fn add_failed_deployment(&self, app: &str) {
        gauge!(FAILED_DEPLOYMENT, "app" => app.to_string()).increment(1.0);
    }

    fn reset_failed_deployment(&self, app: &str) {
        gauge!(FAILED_DEPLOYMENT, "app" => app.to_string()).set(0.0);
    }

    fn set_argo_unavailable(&self, unavailable: bool) {
        gauge!(ARGOCD_UNAVAILABLE).set(if unavailable { 1.0 } else { 0.0 });
    }

    fn add_in_progress_task(&self) {
        gauge!(IN_PROGRESS_TASKS).increment(1.0);
    }

    fn remove_in_progress_task(&self) {
        gauge!(IN_PROGRESS_TASKS).decrement(1.0);
    }
}
