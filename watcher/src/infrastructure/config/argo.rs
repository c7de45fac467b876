//! Argo CD connection settings.

use secrecy::SecretString;
use serde::Deserialize;

/// Argo CD API settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ArgoSettings {
    /// Base URL of the Argo CD server.
    pub url: String,
    /// API token.
    pub token: SecretString,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    60
}
