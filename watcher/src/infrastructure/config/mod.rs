//! Configuration management for the watcher.
//!
//! Settings come from built-in defaults overlaid with `WATCHER__`-prefixed
//! environment variables, `__` separating nested keys.
//!
//! # Example
//!
//! ```no_run
//! use rollout_watcher::infrastructure::config::Settings;
//!
//! // WATCHER__ARGO__URL=https://argocd.example.com WATCHER__ARGO__TOKEN=...
//! let settings = Settings::new().expect("Failed to load configuration");
//! assert_eq!(settings.sweep.interval_minutes, 60);
//! ```

pub mod argo;
pub mod database;
pub mod git;
pub mod rollout;
pub mod server;
pub mod sweep;
pub mod telemetry;
pub mod webhook;

pub use argo::ArgoSettings;
pub use database::{DatabaseSettings, StorageKind};
pub use git::GitSettings;
pub use rollout::RolloutSettings;
pub use server::ServerSettings;
pub use sweep::SweepSettings;
pub use telemetry::TelemetrySettings;
pub use webhook::WebhookSettings;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "WATCHER";

/// Top-level configuration for the watcher.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Control-plane server settings.
    pub server: ServerSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
    /// Task storage backend.
    #[serde(default)]
    pub storage: StorageKind,
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Argo CD settings.
    pub argo: ArgoSettings,
    /// Rollout polling settings.
    #[serde(default)]
    pub rollout: RolloutSettings,
    /// Obsolete-task sweep settings.
    #[serde(default)]
    pub sweep: SweepSettings,
    /// GitOps mutation settings.
    #[serde(default)]
    pub git: GitSettings,
    /// Webhook notification settings.
    #[serde(default)]
    pub webhook: WebhookSettings,
}

impl Settings {
    /// Creates a new settings instance from environment variables and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("telemetry.service_name", "rollout-watcher")?
            .set_default("telemetry.sampling_ratio", 1.0)?
            .add_source(
                environment
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("webhook.allowed_codes"),
            )
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_environment(Environment::with_prefix(ENV_PREFIX).source(Some(map)))
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("WATCHER__ARGO__URL", "https://argocd.example.com"),
        ("WATCHER__ARGO__TOKEN", "s3cr3t"),
    ];

    #[test]
    fn test_defaults() {
        let settings = load(&REQUIRED).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.storage, StorageKind::Memory);
        assert_eq!(settings.rollout.retry_delay_secs, 15);
        assert_eq!(settings.sweep.schedule(), crate::store::SweepSchedule::default());
        assert_eq!(settings.git.backoff(), crate::rollout::BackoffConfig::default());
        assert_eq!(settings.webhook.allowed_codes, vec![200]);
        assert!(settings.webhook.url.is_none());
        assert_eq!(settings.argo.token.expose_secret(), "s3cr3t");
    }

    #[test]
    fn test_environment_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("WATCHER__STORAGE", "postgres"),
            ("WATCHER__DATABASE__URL", "postgres://localhost/watcher"),
            ("WATCHER__ROLLOUT__REGISTRY_PROXY", "proxy.example.com/cache"),
            ("WATCHER__ROLLOUT__ACCEPT_SUSPENDED", "true"),
            ("WATCHER__WEBHOOK__ALLOWED_CODES", "200,204"),
            ("WATCHER__SWEEP__INTERVAL_MINUTES", "5"),
        ]);
        let settings = load(&vars).unwrap();

        assert_eq!(settings.storage, StorageKind::Postgres);
        assert!(settings.database.url.is_some());
        let tuning = settings.rollout.tuning();
        assert_eq!(tuning.check.registry_proxy.as_deref(), Some("proxy.example.com/cache"));
        assert!(tuning.check.accept_suspended);
        assert_eq!(settings.webhook.allowed_codes, vec![200, 204]);
        assert_eq!(settings.sweep.schedule().interval.as_secs(), 300);
    }

    #[test]
    fn test_missing_argo_settings_fail() {
        assert!(load(&[]).is_err());
    }
}
