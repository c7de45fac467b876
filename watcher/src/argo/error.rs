//! Error types for control plane calls.

use std::sync::LazyLock;

use regex::Regex;

static NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(code\s*=\s*NotFound|\bnot found\b)").expect("NOT_FOUND regex should be valid")
});

static CONNECTION_REFUSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)connection refused").expect("CONNECTION_REFUSED regex should be valid")
});

/// Errors returned by the Argo CD API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgoApiError {
    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The API endpoint refused the connection.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    /// The session token was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Any other API failure.
    #[error("api error: {0}")]
    Api(String),
}

impl ArgoApiError {
    /// Classifies a raw error message by its text.
    ///
    /// "not found" patterns become [`Self::NotFound`], "connection refused"
    /// becomes [`Self::ConnectionRefused`], everything else is [`Self::Api`].
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if NOT_FOUND.is_match(&message) {
            Self::NotFound(message)
        } else if CONNECTION_REFUSED.is_match(&message) {
            Self::ConnectionRefused(message)
        } else {
            Self::Api(message)
        }
    }

    /// Returns `true` if the control plane could not be reached at all.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::ConnectionRefused(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = ArgoApiError::classify(
            r#"rpc error: code = NotFound desc = applications.argoproj.io "demo" not found"#,
        );
        assert!(matches!(err, ArgoApiError::NotFound(_)));
        assert!(matches!(
            ArgoApiError::classify("application Not Found"),
            ArgoApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_classify_connection_refused() {
        let err = ArgoApiError::classify("dial tcp 127.0.0.1:8080: connect: connection refused");
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_classify_other_is_api_error() {
        let err = ArgoApiError::classify("HTTP 500: internal error");
        assert_eq!(err, ArgoApiError::Api("HTTP 500: internal error".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = ArgoApiError::Unauthorized("token expired".to_string());
        assert_eq!(err.to_string(), "unauthorized: token expired");
    }
}
