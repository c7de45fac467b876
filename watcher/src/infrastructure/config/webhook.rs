//! Webhook notification settings.

use secrecy::SecretString;
use serde::Deserialize;

/// Webhook receiver settings; disabled without a URL.
#[derive(Debug, Deserialize, Clone)]
pub struct WebhookSettings {
    /// Receiver URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Header carrying the token.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    /// Token sent in `auth_header`.
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Response codes counted as delivered.
    #[serde(default = "default_allowed_codes")]
    pub allowed_codes: Vec<u16>,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: None,
            auth_header: default_auth_header(),
            token: None,
            allowed_codes: default_allowed_codes(),
        }
    }
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_allowed_codes() -> Vec<u16> {
    vec![200]
}
