//! HTTP webhook notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::{NotificationStrategy, NotifyError};
use crate::task::Task;

/// Webhook delivery settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Receiver URL.
    pub url: Url,
    /// Optional `(header name, token)` sent with every request.
    pub authorization: Option<(String, SecretString)>,
    /// Response codes counted as delivered.
    pub allowed_codes: Vec<u16>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Creates a config accepting only `200`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            authorization: None,
            allowed_codes: vec![200],
            timeout: Duration::from_secs(30),
        }
    }

    /// Sends `token` in the `header` request header.
    #[must_use]
    pub fn with_authorization(mut self, header: impl Into<String>, token: SecretString) -> Self {
        self.authorization = Some((header.into(), token));
        self
    }

    /// Replaces the accepted response codes.
    #[must_use]
    pub fn with_allowed_codes(mut self, codes: Vec<u16>) -> Self {
        self.allowed_codes = codes;
        self
    }
}

/// Posts tasks as JSON to a webhook receiver.
pub struct WebhookStrategy {
    client: Client,
    config: WebhookConfig,
}

impl WebhookStrategy {
    /// Builds the strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationStrategy for WebhookStrategy {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip_all, fields(task_id = %task.id, app = %task.app))]
    async fn send(&self, task: &Task) -> Result<(), NotifyError> {
        let mut request = self.client.post(self.config.url.clone()).json(task);
        if let Some((header, token)) = &self.config.authorization {
            request = request.header(header.as_str(), token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let code = response.status().as_u16();
        if self.config.allowed_codes.contains(&code) {
            Ok(())
        } else {
            Err(NotifyError::UnexpectedStatus(code))
        }
    }
}
