//! Application snapshot as reported by the Argo CD API.
//!
//! Only the fields the watcher reads are modelled; everything else in the
//! payload is ignored. All fields default so partial payloads still decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::annotations::WatcherAnnotations;

/// Sync status reported once the live state matches Git.
pub const SYNC_SYNCED: &str = "Synced";
/// Health status of a fully converged application.
pub const HEALTH_HEALTHY: &str = "Healthy";
/// Health status of a degraded application.
pub const HEALTH_DEGRADED: &str = "Degraded";
/// Health status of a suspended application.
pub const HEALTH_SUSPENDED: &str = "Suspended";

/// An Argo CD application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: ApplicationSpec,
    /// Observed state.
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    /// Parses the watcher annotations of this snapshot.
    #[must_use]
    pub fn watcher_annotations(&self) -> WatcherAnnotations {
        self.metadata
            .annotations
            .as_ref()
            .map(WatcherAnnotations::parse)
            .unwrap_or_default()
    }

    /// Images currently deployed, as `repository:tag`.
    #[must_use]
    pub fn images(&self) -> &[String] {
        &self.status.summary.images
    }

    /// Sync status string.
    #[must_use]
    pub fn sync_status(&self) -> &str {
        &self.status.sync.status
    }

    /// Health status string.
    #[must_use]
    pub fn health_status(&self) -> &str {
        &self.status.health.status
    }

    /// The single source, when the application is not multi-source.
    #[must_use]
    pub fn single_source(&self) -> Option<&ApplicationSource> {
        if self.spec.sources.is_empty() {
            self.spec.source.as_ref()
        } else {
            None
        }
    }
}

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Application name.
    #[serde(default)]
    pub name: String,
    /// Annotations; absent when the object has none.
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Desired state of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Single source.
    #[serde(default)]
    pub source: Option<ApplicationSource>,
    /// Multiple sources.
    #[serde(default)]
    pub sources: Vec<ApplicationSource>,
}

/// A Git source of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    /// Repository URL.
    #[serde(rename = "repoURL", default)]
    pub repo_url: String,
    /// Branch, tag or commit tracked.
    #[serde(default)]
    pub target_revision: String,
    /// Directory inside the repository.
    #[serde(default)]
    pub path: String,
}

/// Observed state of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Sync status.
    #[serde(default)]
    pub sync: SyncStatus,
    /// Aggregate health.
    #[serde(default)]
    pub health: HealthStatus,
    /// Summary of deployed artefacts.
    #[serde(default)]
    pub summary: Summary,
    /// Last sync operation.
    #[serde(default)]
    pub operation_state: Option<OperationState>,
    /// Per-resource status.
    #[serde(default)]
    pub resources: Vec<ResourceStatus>,
}

/// Sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// `Synced`, `OutOfSync` or `Unknown`.
    #[serde(default)]
    pub status: String,
}

/// Health status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `Healthy`, `Progressing`, `Degraded`, `Suspended`, `Missing` or `Unknown`.
    #[serde(default)]
    pub status: String,
    /// Optional explanation.
    #[serde(default)]
    pub message: Option<String>,
}

/// Deployed artefact summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Images as `repository:tag`.
    #[serde(default)]
    pub images: Vec<String>,
}

/// State of the last sync operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    /// `Running`, `Succeeded`, `Failed`, `Error` or `Terminating`.
    #[serde(default)]
    pub phase: String,
    /// Operation message.
    #[serde(default)]
    pub message: String,
    /// Per-resource outcome.
    #[serde(default)]
    pub sync_result: Option<SyncResult>,
}

/// Result of a sync operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Resources touched by the sync.
    #[serde(default)]
    pub resources: Vec<ResourceResult>,
}

/// Sync outcome for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResult {
    /// Kind.
    #[serde(default)]
    pub kind: String,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Namespace.
    #[serde(default)]
    pub namespace: String,
    /// `Synced`, `SyncFailed`, `Pruned`...
    #[serde(default)]
    pub status: String,
    /// Outcome message.
    #[serde(default)]
    pub message: String,
    /// Hook phase, for hook resources.
    #[serde(default)]
    pub hook_phase: Option<String>,
}

/// Live status of one managed resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Kind.
    #[serde(default)]
    pub kind: String,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Namespace.
    #[serde(default)]
    pub namespace: String,
    /// Sync status.
    #[serde(default)]
    pub status: String,
    /// Health, absent for resources without a health check.
    #[serde(default)]
    pub health: Option<HealthStatus>,
}

/// Session information of the configured token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Whether the session is authenticated.
    #[serde(default)]
    pub logged_in: bool,
    /// Authenticated user.
    #[serde(default)]
    pub username: String,
}
