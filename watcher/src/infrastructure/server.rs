//! Control-plane HTTP server.
//!
//! Serves liveness, readiness and the Prometheus exposition next to the
//! rollout workers.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;

use super::config::ServerSettings;
use crate::service::RolloutService;

#[derive(Clone)]
struct ControlPlane {
    service: RolloutService,
    metrics: PrometheusHandle,
}

async fn liveness() -> &'static str {
    "OK"
}

async fn readiness(State(state): State<ControlPlane>) -> (StatusCode, String) {
    match state.service.orchestrator().check().await {
        Ok(status) => (StatusCode::OK, status.to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn render_metrics(State(state): State<ControlPlane>) -> String {
    state.metrics.render()
}

/// Control-plane routes: liveness, readiness and Prometheus metrics.
pub fn router(service: RolloutService, metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(ControlPlane { service, metrics })
}

/// Runs the control plane HTTP server until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters an error while running.
pub async fn run_server(
    config: &ServerSettings,
    service: RolloutService,
    metrics: PrometheusHandle,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_address().parse()?;
    tracing::info!("Control Plane listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(service, metrics))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
