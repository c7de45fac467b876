//! Rollout Watcher - observes GitOps deployment rollouts on Argo CD.
//!
//! A caller submits a deployment task (application plus expected images).
//! The watcher optionally writes the expected tags into the application's
//! GitOps repository, then polls Argo CD until the application converges,
//! regresses or runs out of attempts, and records the outcome.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Argo CD API client and application model.
pub mod argo;
/// GitOps repository mutation.
pub mod gitops;
/// Infrastructure components (config, server, telemetry, metrics, audit).
pub mod infrastructure;
/// Keyed mutual exclusion.
pub mod lock;
/// Notification delivery.
pub mod notify;
/// Task admission and health checks.
pub mod orchestrator;
/// Rollout classification and the polling state machine.
pub mod rollout;
/// Admission plus observation in one call.
pub mod service;
/// Task persistence.
pub mod store;
/// Deployment task model.
pub mod task;

pub use orchestrator::Orchestrator;
pub use rollout::StatusUpdater;
pub use service::RolloutService;
