//! Terminal outcomes of a rollout and their human-readable reasons.

use std::fmt::Write as _;

use crate::argo::{Application, ArgoApiError};
use crate::task::TaskStatus;

/// Terminal outcome of one rollout execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutOutcome {
    /// The application converged, or the check was skipped by fire-and-forget.
    Deployed,
    /// The rollout failed.
    Failed(RolloutFailure),
}

impl RolloutOutcome {
    /// Status and reason to persist for this outcome.
    #[must_use]
    pub fn into_status(self) -> (TaskStatus, String) {
        match self {
            Self::Deployed => (TaskStatus::Deployed, String::new()),
            Self::Failed(failure) => (failure.status(), failure.reason()),
        }
    }
}

/// Why a rollout failed, with the diagnostics operators need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutFailure {
    /// A fetch failed.
    Api(ArgoApiError),
    /// The GitOps mutation failed before polling began.
    GitOps(String),
    /// Expected images were still missing when the budget ran out.
    NotAvailable {
        /// Images last seen deployed.
        current: Vec<String>,
        /// Images the task expects.
        expected: Vec<String>,
    },
    /// The application was still out of sync when the budget ran out.
    NotSynced(SyncReport),
    /// The application was still unhealthy when the budget ran out.
    NotHealthy(HealthReport),
    /// Health degraded after the deployed images changed.
    Degraded(HealthReport),
}

impl RolloutFailure {
    /// Task status this failure maps to.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        match self {
            Self::Api(ArgoApiError::NotFound(_)) => TaskStatus::AppNotFound,
            Self::Api(ArgoApiError::ConnectionRefused(_)) => TaskStatus::ArgoUnavailable,
            _ => TaskStatus::Failed,
        }
    }

    /// Human-readable reason persisted with the task.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Api(ArgoApiError::ConnectionRefused(message)) => {
                format!("ArgoCD is unavailable: {message}")
            }
            Self::Api(err) => format!("ArgoCD API Error: {err}"),
            Self::GitOps(message) => format!("failed to update GitOps repository: {message}"),
            Self::NotAvailable { current, expected } => {
                let mut reason = failed_header("not available");
                reason.push_str("List of current images (last app check):\n");
                push_list(&mut reason, current);
                reason.push_str("\nList of expected images:\n");
                push_list(&mut reason, expected);
                reason
            }
            Self::NotSynced(report) => {
                let mut reason = failed_header("not synced");
                report.render(&mut reason);
                reason
            }
            Self::NotHealthy(report) => {
                let mut reason = failed_header("not healthy");
                report.render(&mut reason);
                reason
            }
            Self::Degraded(report) => {
                let mut reason = failed_header("degraded");
                reason.push_str("Deployed images changed since the rollout started.\n");
                report.render(&mut reason);
                reason
            }
        }
    }
}

fn failed_header(rollout_status: &str) -> String {
    format!("Application deployment failed. Rollout status \"{rollout_status}\"\n\n")
}

fn push_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("\t(none)\n");
    }
    for item in items {
        let _ = writeln!(out, "\t{item}");
    }
}

/// Sync diagnostics of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Sync status.
    pub sync_status: String,
    /// Phase of the last sync operation.
    pub phase: String,
    /// Message of the last sync operation.
    pub message: String,
    /// One line per resource touched by the sync.
    pub resources: Vec<String>,
}

impl SyncReport {
    /// Extracts the sync diagnostics of `app`.
    #[must_use]
    pub fn from_application(app: &Application) -> Self {
        let operation = app.status.operation_state.as_ref();
        let resources = operation
            .and_then(|op| op.sync_result.as_ref())
            .map(|result| {
                result
                    .resources
                    .iter()
                    .map(|r| {
                        let mut line = format!("{}({}) {}", r.kind, r.name, r.status);
                        if let Some(hook) = r.hook_phase.as_deref().filter(|h| !h.is_empty()) {
                            let _ = write!(line, " {hook}");
                        }
                        if !r.message.is_empty() {
                            let _ = write!(line, " with message {}", r.message);
                        }
                        line
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            sync_status: app.sync_status().to_string(),
            phase: operation.map(|op| op.phase.clone()).unwrap_or_default(),
            message: operation.map(|op| op.message.clone()).unwrap_or_default(),
            resources,
        }
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "App sync status \"{}\"", self.sync_status);
        let _ = writeln!(out, "App operation phase \"{}\"", self.phase);
        let _ = writeln!(out, "App operation message \"{}\"", self.message);
        out.push_str("Resources:\n");
        push_list(out, &self.resources);
    }
}

/// Health diagnostics of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// Sync status.
    pub sync_status: String,
    /// Aggregate health.
    pub health_status: String,
    /// Aggregate health message, if any.
    pub message: Option<String>,
    /// One line per resource that is not healthy.
    pub resources: Vec<String>,
}

impl HealthReport {
    /// Extracts the health diagnostics of `app`.
    #[must_use]
    pub fn from_application(app: &Application) -> Self {
        let resources = app
            .status
            .resources
            .iter()
            .filter_map(|r| {
                let health = r.health.as_ref()?;
                if health.status == crate::argo::application::HEALTH_HEALTHY {
                    return None;
                }
                let mut line = format!("{}({}) {}", r.kind, r.name, health.status);
                if let Some(message) = health.message.as_deref().filter(|m| !m.is_empty()) {
                    let _ = write!(line, " with message {message}");
                }
                Some(line)
            })
            .collect();

        Self {
            sync_status: app.sync_status().to_string(),
            health_status: app.health_status().to_string(),
            message: app.status.health.message.clone(),
            resources,
        }
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "App sync status \"{}\"", self.sync_status);
        let _ = writeln!(out, "App health status \"{}\"", self.health_status);
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            let _ = writeln!(out, "App health message \"{message}\"");
        }
        out.push_str("Resources:\n");
        push_list(out, &self.resources);
    }
}
