//! Logging and tracing settings.

use serde::Deserialize;

/// Telemetry configuration settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    /// Service name for telemetry.
    pub service_name: String,
    /// Default log filter, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit logs as JSON instead of human-readable lines.
    #[serde(default = "default_json")]
    pub json: bool,
    /// OTLP endpoint for traces.
    pub otlp_endpoint: Option<String>,
    /// Sampling ratio for traces.
    #[serde(default = "default_sampling")]
    pub sampling_ratio: f64,
}

fn default_level() -> String {
    "info".to_string()
}

const fn default_json() -> bool {
    true
}

const fn default_sampling() -> f64 {
    1.0
}
