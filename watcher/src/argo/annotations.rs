//! Typed view of the watcher annotations carried by an application.
//!
//! Annotations are free-form strings on the remote object. They are parsed
//! once per snapshot into [`WatcherAnnotations`] so decision points never
//! look at raw keys.

use std::collections::BTreeMap;

use tracing::warn;

/// Opts the application into GitOps mutation.
pub const MANAGED: &str = "argo-watcher/managed";
/// `alias=repository` pairs mapping Helm value aliases to image repositories.
pub const MANAGED_IMAGES: &str = "argo-watcher/managed-images";
/// Skips convergence checks and reports success unconditionally.
pub const FIRE_AND_FORGET: &str = "argo-watcher/fire-and-forget";
/// Overrides the GitOps repository URL.
pub const WRITE_BACK_REPO: &str = "argo-watcher/write-back-repo";
/// Overrides the GitOps branch.
pub const WRITE_BACK_BRANCH: &str = "argo-watcher/write-back-branch";
/// Overrides the path inside the GitOps repository.
pub const WRITE_BACK_PATH: &str = "argo-watcher/write-back-path";

/// GitOps location overrides taken from annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBackOverride {
    /// Repository URL.
    pub repo_url: Option<String>,
    /// Branch name.
    pub branch: Option<String>,
    /// Directory holding the override file.
    pub path: Option<String>,
}

/// Parsed watcher annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherAnnotations {
    /// Application is managed by the watcher.
    pub managed: bool,
    /// Success is reported without convergence checks.
    pub fire_and_forget: bool,
    /// Alias to image repository.
    pub managed_images: BTreeMap<String, String>,
    /// Repository location overrides.
    pub write_back: WriteBackOverride,
}

impl WatcherAnnotations {
    /// Parses the annotation map of an application.
    #[must_use]
    pub fn parse(annotations: &BTreeMap<String, String>) -> Self {
        let non_empty = |key: &str| {
            annotations
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            managed: annotations.get(MANAGED).is_some_and(|v| is_true(v)),
            fire_and_forget: annotations.get(FIRE_AND_FORGET).is_some_and(|v| is_true(v)),
            managed_images: annotations
                .get(MANAGED_IMAGES)
                .map(|v| parse_managed_images(v))
                .unwrap_or_default(),
            write_back: WriteBackOverride {
                repo_url: non_empty(WRITE_BACK_REPO),
                branch: non_empty(WRITE_BACK_BRANCH),
                path: non_empty(WRITE_BACK_PATH),
            },
        }
    }

    /// Returns the Helm alias configured for an image repository.
    #[must_use]
    pub fn alias_for(&self, image: &str) -> Option<&str> {
        self.managed_images
            .iter()
            .find(|(_, repository)| repository.as_str() == image)
            .map(|(alias, _)| alias.as_str())
    }
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_managed_images(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((alias, image)) if !alias.trim().is_empty() && !image.trim().is_empty() => {
                Some((alias.trim().to_string(), image.trim().to_string()))
            }
            _ => {
                warn!(entry, "Ignoring malformed managed-images entry");
                None
            }
        })
        .collect()
}
