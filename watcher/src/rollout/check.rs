//! Pure rollout classification.
//!
//! [`check_rollout`] decides, from one observation of an application, whether
//! the rollout has converged, should be polled again, or has regressed.

use sha2::{Digest, Sha256};

use crate::argo::Application;
use crate::argo::application::{HEALTH_DEGRADED, HEALTH_HEALTHY, HEALTH_SUSPENDED, SYNC_SYNCED};
use crate::task::Image;

/// Knobs affecting classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Registry proxy prefix images may be deployed under, e.g. `proxy.example.com/cache`.
    pub registry_proxy: Option<String>,
    /// Treat `Suspended` health as success.
    pub accept_suspended: bool,
}

/// The parts of an application snapshot classification looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation<'a> {
    /// Deployed images as `repository:tag`.
    pub images: &'a [String],
    /// Sync status.
    pub sync_status: &'a str,
    /// Health status.
    pub health_status: &'a str,
}

impl<'a> From<&'a Application> for Observation<'a> {
    fn from(app: &'a Application) -> Self {
        Self {
            images: app.images(),
            sync_status: app.sync_status(),
            health_status: app.health_status(),
        }
    }
}

/// Why a rollout has not converged yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    /// At least one expected image is not deployed.
    NotAvailable,
    /// The application is not synced.
    NotSynced,
    /// Health is degraded but the deployed images are those seen at the start.
    DegradedUnchanged,
    /// Health is neither healthy nor an accepted alternative.
    NotHealthy,
}

/// Result of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutCheck {
    /// Converged on the expected state.
    Deployed,
    /// Not there yet; poll again.
    Pending(PendingReason),
    /// Degraded with a changed image set. Retrying will not help.
    Regressed,
}

impl RolloutCheck {
    /// Returns `true` if no further polling can change the outcome.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

/// Stable fingerprint of a deployed image set: SHA-256 of the sorted,
/// comma-joined list.
#[must_use]
pub fn images_hash(images: &[String]) -> String {
    let mut sorted: Vec<&str> = images.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    hex::encode(Sha256::digest(sorted.join(",").as_bytes()))
}

/// Returns `true` if `expected` is among `deployed`, directly or behind the proxy.
fn is_deployed(expected: &Image, deployed: &[String], registry_proxy: Option<&str>) -> bool {
    let reference = expected.to_string();
    let proxied = registry_proxy
        .map(|proxy| proxy.trim_end_matches('/'))
        .filter(|proxy| !proxy.is_empty())
        .map(|proxy| format!("{proxy}/{reference}"));

    deployed
        .iter()
        .any(|image| *image == reference || proxied.as_ref().is_some_and(|p| image == p))
}

/// Expected images missing from the observation.
#[must_use]
pub fn missing_images<'a>(
    expected: &'a [Image],
    deployed: &[String],
    options: &CheckOptions,
) -> Vec<&'a Image> {
    expected
        .iter()
        .filter(|image| !is_deployed(image, deployed, options.registry_proxy.as_deref()))
        .collect()
}

/// Classifies one observation against the expected images.
///
/// `baseline_hash` is the [`images_hash`] captured at the start of the
/// rollout; it separates a transient degraded reading from a regression.
#[must_use]
pub fn check_rollout(
    expected: &[Image],
    observation: Observation<'_>,
    baseline_hash: &str,
    options: &CheckOptions,
) -> RolloutCheck {
    if !missing_images(expected, observation.images, options).is_empty() {
        return RolloutCheck::Pending(PendingReason::NotAvailable);
    }

    if observation.sync_status != SYNC_SYNCED {
        return RolloutCheck::Pending(PendingReason::NotSynced);
    }

    match observation.health_status {
        HEALTH_HEALTHY => RolloutCheck::Deployed,
        HEALTH_SUSPENDED if options.accept_suspended => RolloutCheck::Deployed,
        HEALTH_DEGRADED => {
            if images_hash(observation.images) == baseline_hash {
                RolloutCheck::Pending(PendingReason::DegradedUnchanged)
            } else {
                RolloutCheck::Regressed
            }
        }
        _ => RolloutCheck::Pending(PendingReason::NotHealthy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn observe<'a>(deployed: &'a [String], sync: &'a str, health: &'a str) -> Observation<'a> {
        Observation {
            images: deployed,
            sync_status: sync,
            health_status: health,
        }
    }

    fn expected() -> Vec<Image> {
        vec![Image::new("repo/app", "v1")]
    }

    #[test]
    fn test_converged_rollout_is_deployed() {
        let deployed = images(&["repo/app:v1"]);
        let check = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Healthy"),
            &images_hash(&deployed),
            &CheckOptions::default(),
        );
        assert_eq!(check, RolloutCheck::Deployed);
    }

    #[test]
    fn test_missing_image_is_not_available() {
        let deployed = images(&["repo/app:v0"]);
        let check = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Healthy"),
            "",
            &CheckOptions::default(),
        );
        assert_eq!(check, RolloutCheck::Pending(PendingReason::NotAvailable));
    }

    #[test]
    fn test_out_of_sync_is_not_synced() {
        let deployed = images(&["repo/app:v1"]);
        let check = check_rollout(
            &expected(),
            observe(&deployed, "OutOfSync", "Healthy"),
            "",
            &CheckOptions::default(),
        );
        assert_eq!(check, RolloutCheck::Pending(PendingReason::NotSynced));
    }

    #[test]
    fn test_degraded_with_unchanged_images_is_retryable() {
        let deployed = images(&["repo/app:v1"]);
        let check = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Degraded"),
            &images_hash(&deployed),
            &CheckOptions::default(),
        );
        assert_eq!(check, RolloutCheck::Pending(PendingReason::DegradedUnchanged));
        assert!(!check.is_final());
    }

    #[test]
    fn test_degraded_with_changed_images_is_regression() {
        let baseline = images(&["repo/app:v0"]);
        let deployed = images(&["repo/app:v1"]);
        let check = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Degraded"),
            &images_hash(&baseline),
            &CheckOptions::default(),
        );
        assert_eq!(check, RolloutCheck::Regressed);
        assert!(check.is_final());
    }

    #[test]
    fn test_progressing_is_not_healthy() {
        let deployed = images(&["repo/app:v1"]);
        let check = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Progressing"),
            "",
            &CheckOptions::default(),
        );
        assert_eq!(check, RolloutCheck::Pending(PendingReason::NotHealthy));
    }

    #[test]
    fn test_suspended_needs_opt_in() {
        let deployed = images(&["repo/app:v1"]);
        let strict = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Suspended"),
            "",
            &CheckOptions::default(),
        );
        assert_eq!(strict, RolloutCheck::Pending(PendingReason::NotHealthy));

        let lenient = check_rollout(
            &expected(),
            observe(&deployed, "Synced", "Suspended"),
            "",
            &CheckOptions {
                accept_suspended: true,
                ..CheckOptions::default()
            },
        );
        assert_eq!(lenient, RolloutCheck::Deployed);
    }

    #[test]
    fn test_registry_proxy_prefix_is_accepted() {
        let deployed = images(&["proxy.example.com/cache/repo/app:v1"]);
        let options = CheckOptions {
            registry_proxy: Some("proxy.example.com/cache/".to_string()),
            ..CheckOptions::default()
        };
        assert!(missing_images(&expected(), &deployed, &options).is_empty());
        assert_eq!(
            missing_images(&expected(), &deployed, &CheckOptions::default()).len(),
            1
        );
    }

    #[test]
    fn test_images_hash_ignores_order() {
        let a = images(&["b:2", "a:1"]);
        let b = images(&["a:1", "b:2"]);
        assert_eq!(images_hash(&a), images_hash(&b));
        assert_ne!(images_hash(&a), images_hash(&images(&["a:1"])));
    }
}
