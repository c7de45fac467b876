/// Audit logging for security events.
pub mod audit;
/// Configuration management for the watcher.
pub mod config;
/// Rollout metrics.
pub mod metrics;
/// HTTP server and control plane.
pub mod server;
/// Telemetry setup for logging and tracing.
pub mod telemetry;
