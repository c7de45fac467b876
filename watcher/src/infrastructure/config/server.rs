//! Control-plane server settings.

use serde::Deserialize;

/// Server binding settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ServerSettings {
    /// `host:port` for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
