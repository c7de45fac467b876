//! Argo CD control plane access.

/// Application snapshot model.
pub mod application;
/// Typed watcher annotations.
pub mod annotations;
/// API client and contract.
pub mod client;
/// API error classification.
pub mod error;

pub use annotations::{WatcherAnnotations, WriteBackOverride};
pub use application::{Application, UserInfo};
pub use client::{ArgoApi, ArgoClient, ArgoConfig};
pub use error::ArgoApiError;
