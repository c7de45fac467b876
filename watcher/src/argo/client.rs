//! Argo CD API HTTP client.
//!
//! This module provides the [`ArgoApi`] contract and its reqwest-based
//! implementation talking to the Argo CD REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::application::{Application, UserInfo};
use super::error::ArgoApiError;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote control plane operations consumed by the watcher.
#[async_trait]
pub trait ArgoApi: Send + Sync {
    /// Fetches the current snapshot of an application.
    async fn get_application(&self, name: &str) -> Result<Application, ArgoApiError>;

    /// Fetches the session state of the configured token.
    async fn get_user_info(&self) -> Result<UserInfo, ArgoApiError>;
}

/// Connection settings for [`ArgoClient`].
pub struct ArgoConfig {
    /// Base URL of the Argo CD server.
    pub base_url: Url,
    /// API token sent as a bearer credential.
    pub token: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ArgoConfig {
    /// Creates a config with the default timeout.
    #[must_use]
    pub fn new(base_url: Url, token: SecretString) -> Self {
        Self {
            base_url,
            token,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the Argo CD API.
pub struct ArgoClient {
    client: Client,
    base_url: Url,
    token: SecretString,
}

impl ArgoClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ArgoConfig) -> Result<Self, ArgoApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArgoApiError::Api(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(config.base_url),
            token: config.token,
        })
    }

    /// API URL under the base path, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ArgoApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ArgoApiError::Api(format!("base URL {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ArgoApiError> {
        let res = self
            .client
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = res.status();
        if status == StatusCode::OK {
            return res
                .json()
                .await
                .map_err(|e| ArgoApiError::Api(format!("invalid response body: {e}")));
        }

        let body = res.text().await.unwrap_or_default();
        debug!(%status, body = %body, "Argo CD API returned an error");
        Err(match status {
            StatusCode::NOT_FOUND => ArgoApiError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ArgoApiError::Unauthorized(body),
            _ => ArgoApiError::classify(format!("HTTP {status}: {body}")),
        })
    }
}

#[async_trait]
impl ArgoApi for ArgoClient {
    #[instrument(skip(self))]
    async fn get_application(&self, name: &str) -> Result<Application, ArgoApiError> {
        if matches!(name, "" | "." | "..") {
            return Err(ArgoApiError::NotFound(format!(
                "invalid application name {name:?}"
            )));
        }
        self.get_json(self.endpoint(&["api", "v1", "applications", name])?)
            .await
    }

    #[instrument(skip(self))]
    async fn get_user_info(&self) -> Result<UserInfo, ArgoApiError> {
        self.get_json(self.endpoint(&["api", "v1", "session", "userinfo"])?)
            .await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn map_transport_error(e: reqwest::Error) -> ArgoApiError {
    if e.is_connect() {
        ArgoApiError::ConnectionRefused(e.to_string())
    } else {
        ArgoApiError::classify(e.to_string())
    }
}
