//! Rollout Watcher service binary.
//!
//! Wires the task store, Argo CD client, GitOps updater and notifications from
//! the environment, runs the obsolete-task sweep and serves the control plane
//! until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::Url;
use rollout_watcher::argo::{ArgoClient, ArgoConfig};
use rollout_watcher::gitops::{GitCli, GitConfigUpdater};
use rollout_watcher::infrastructure::config::{Settings, StorageKind};
use rollout_watcher::infrastructure::metrics::{MetricsSink, PrometheusMetrics};
use rollout_watcher::infrastructure::{audit, server, telemetry::TelemetryBuilder};
use rollout_watcher::lock::{InMemoryLocker, Locker, PostgresLocker};
use rollout_watcher::notify::{Notifier, WebhookConfig, WebhookStrategy};
use rollout_watcher::store::{InMemoryTaskRepository, PostgresTaskRepository, TaskRepository};
use rollout_watcher::{Orchestrator, RolloutService, StatusUpdater};
use secrecy::ExposeSecret;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Settings::new().context("Failed to load configuration")?;

    TelemetryBuilder::from_settings(&config.telemetry, env!("CARGO_PKG_VERSION"))
        .init()
        .context("Failed to initialize telemetry")?;

    info!("Rollout Watcher Starting...");
    audit::log_audit(&audit::AuditEvent::SystemStartup {
        component: "rollout-watcher".into(),
    });

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    let metrics: Arc<dyn MetricsSink> = Arc::new(PrometheusMetrics::new());

    let (repository, locker) = storage(&config).await?;

    let argo_config = ArgoConfig::new(
        Url::parse(&config.argo.url).context("Invalid Argo CD URL")?,
        config.argo.token.clone(),
    )
    .with_timeout(Duration::from_secs(config.argo.timeout_secs));
    let argo = Arc::new(ArgoClient::new(argo_config)?);

    let mut updater = StatusUpdater::new(argo.clone(), repository.clone(), metrics.clone())
        .with_settings(config.rollout.tuning())
        .with_notifier(notifier(&config)?);
    if config.git.enabled {
        info!("GitOps mutation enabled");
        updater = updater.with_git_updater(
            GitConfigUpdater::new(Arc::new(GitCli::new(config.git.cli())), locker)
                .with_backoff(config.git.backoff())
                .with_commit_prefix(config.git.commit_prefix.clone()),
        );
    }
    let orchestrator = Arc::new(Orchestrator::new(repository.clone(), argo, metrics));
    let service = RolloutService::new(orchestrator, Arc::new(updater));

    let schedule = config.sweep.schedule();
    let sweeper = tokio::spawn(async move {
        repository.process_obsolete_tasks(schedule, None).await;
    });

    let server_config = config.server.clone();
    let server = tokio::spawn(async move {
        if let Err(e) =
            server::run_server(&server_config, service, prometheus, shutdown_signal()).await
        {
            error!("Control Plane failed: {:?}", e);
        }
    });

    info!("Rollout Watcher Initialized. Waiting for shutdown signal...");

    if let Err(e) = server.await {
        error!("Control Plane task panicked: {:?}", e);
    }
    sweeper.abort();

    info!("Shutdown signal received, cleaning up...");
    audit::log_audit(&audit::AuditEvent::SystemShutdown {
        reason: "Signal received".into(),
    });

    info!("Rollout Watcher Shutdown Complete.");
    Ok(())
}

async fn storage(
    config: &Settings,
) -> anyhow::Result<(Arc<dyn TaskRepository>, Arc<dyn Locker>)> {
    match config.storage {
        StorageKind::Memory => {
            info!("Using in-memory task storage");
            let repository: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::new());
            let locker: Arc<dyn Locker> = Arc::new(InMemoryLocker::new());
            Ok((repository, locker))
        }
        StorageKind::Postgres => {
            let Some(url) = config.database.url.as_ref() else {
                bail!("WATCHER__DATABASE__URL is required for postgres storage");
            };
            info!("Using postgres task storage");
            let repository =
                PostgresTaskRepository::connect(url.expose_secret(), config.database.max_connections)
                    .await
                    .context("Failed to connect to postgres")?;
            repository
                .migrate()
                .await
                .context("Failed to migrate postgres schema")?;
            let locker: Arc<dyn Locker> = Arc::new(PostgresLocker::new(repository.pool().clone()));
            let repository: Arc<dyn TaskRepository> = Arc::new(repository);
            Ok((repository, locker))
        }
    }
}

fn notifier(config: &Settings) -> anyhow::Result<Notifier> {
    let Some(url) = config.webhook.url.as_deref().filter(|u| !u.is_empty()) else {
        return Ok(Notifier::new());
    };

    let mut webhook = WebhookConfig::new(Url::parse(url).context("Invalid webhook URL")?)
        .with_allowed_codes(config.webhook.allowed_codes.clone());
    if let Some(token) = &config.webhook.token {
        webhook = webhook.with_authorization(config.webhook.auth_header.clone(), token.clone());
    }
    info!(%url, "Webhook notifications enabled");
    Ok(Notifier::new().with_strategy(Arc::new(WebhookStrategy::new(webhook)?)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
