//! Writes expected image tags into the GitOps repository of managed
//! applications.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::GitOpsError;
use super::git::GitClient;
use super::overrides::{HelmParameter, OverrideFile, image_tag_parameter, override_file_name};
use super::repo::GitopsRepo;
use crate::argo::{Application, WatcherAnnotations};
use crate::infrastructure::audit::{AuditEvent, log_audit};
use crate::lock::Locker;
use crate::rollout::retry::BackoffConfig;
use crate::task::Task;

/// Applies image overrides for managed applications, one application at a
/// time.
pub struct GitConfigUpdater {
    git: Arc<dyn GitClient>,
    locker: Arc<dyn Locker>,
    backoff: BackoffConfig,
    commit_prefix: String,
}

impl GitConfigUpdater {
    /// Creates an updater with default backoff.
    #[must_use]
    pub fn new(git: Arc<dyn GitClient>, locker: Arc<dyn Locker>) -> Self {
        Self {
            git,
            locker,
            backoff: BackoffConfig::default(),
            commit_prefix: "argo-watcher".to_string(),
        }
    }

    /// Sets the retry schedule of the git mutation.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the prefix of commit messages.
    #[must_use]
    pub fn with_commit_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.commit_prefix = prefix.into();
        self
    }

    /// Writes the task's image tags to the application's override file.
    ///
    /// Does nothing unless the application is managed and the task validated.
    /// The git mutation runs under the per-application lock and is retried
    /// with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be resolved or the mutation
    /// still fails once the attempts are exhausted.
    #[instrument(skip_all, fields(app = %task.app, task_id = %task.id))]
    pub async fn update_if_needed(&self, app: &Application, task: &Task) -> Result<(), GitOpsError> {
        let annotations = app.watcher_annotations();
        if !annotations.managed || !task.validated {
            debug!(
                managed = annotations.managed,
                validated = task.validated,
                "Skipping GitOps update"
            );
            return Ok(());
        }

        let repo = GitopsRepo::resolve(app, &annotations)?;
        let parameters = image_parameters(task, &annotations);
        if parameters.is_empty() {
            info!("No expected image matches a managed image alias");
            return Ok(());
        }

        self.locker
            .with_lock(
                &task.app,
                Box::pin(async {
                    self.commit_with_backoff(&repo, task, &parameters)
                        .await
                        .map_err(anyhow::Error::from)
                }),
            )
            .await?;
        Ok(())
    }

    async fn commit_with_backoff(
        &self,
        repo: &GitopsRepo,
        task: &Task,
        parameters: &[HelmParameter],
    ) -> Result<(), GitOpsError> {
        let max_attempts = self.backoff.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.apply(repo, task, parameters).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.backoff.calculate_backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        ?delay,
                        error = %e,
                        "GitOps update failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn apply(
        &self,
        repo: &GitopsRepo,
        task: &Task,
        parameters: &[HelmParameter],
    ) -> Result<(), GitOpsError> {
        let checkout = self.git.checkout(repo).await?;
        let relative = override_path(repo, &task.app);
        let absolute = checkout.path().join(&relative);

        let contents = match tokio::fs::read_to_string(&absolute).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut overrides = OverrideFile::parse(&contents)?;
        if !overrides.apply(parameters) {
            info!(file = %relative.display(), "Override file already up to date");
            return Ok(());
        }

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, overrides.render()?).await?;

        let message = format!(
            "{}({}): update {} by {}",
            self.commit_prefix,
            task.app,
            task.expected_images().join(", "),
            if task.author.is_empty() { "unknown" } else { task.author.as_str() }
        );
        self.git
            .commit_and_push(&checkout, repo, &relative, &message)
            .await?;

        info!(file = %relative.display(), "Override committed");
        log_audit(&AuditEvent::GitOpsCommitted {
            app: task.app.clone(),
            task_id: task.id.to_string(),
            repository: repo.to_string(),
            parameters: parameters
                .iter()
                .map(|p| format!("{}={}", p.name, p.value))
                .collect(),
        });
        Ok(())
    }
}

/// Override file location relative to the checkout root.
fn override_path(repo: &GitopsRepo, app: &str) -> PathBuf {
    Path::new(&repo.path).join(override_file_name(app))
}

/// One tag parameter per expected image with a managed alias.
fn image_parameters(task: &Task, annotations: &WatcherAnnotations) -> Vec<HelmParameter> {
    task.images
        .iter()
        .filter_map(|image| {
            annotations
                .alias_for(&image.image)
                .map(|alias| HelmParameter::forced(image_tag_parameter(alias), &image.tag))
        })
        .collect()
}
