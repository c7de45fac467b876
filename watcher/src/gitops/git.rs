//! Git access for GitOps mutations.
//!
//! [`GitClient`] is the seam the updater works against; [`GitCli`] shells out
//! to the `git` binary.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::GitOpsError;
use super::repo::GitopsRepo;

/// A working copy of a GitOps repository, removed on drop.
#[derive(Debug)]
pub struct Checkout {
    dir: TempDir,
}

impl Checkout {
    /// Wraps a directory holding a working copy.
    #[must_use]
    pub const fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    /// Root of the working copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Git operations used to apply an override.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clones the branch of `repo` into a fresh working copy.
    async fn checkout(&self, repo: &GitopsRepo) -> Result<Checkout, GitOpsError>;

    /// Commits `file` (relative to the checkout root) and pushes it to the
    /// branch of `repo`.
    async fn commit_and_push(
        &self,
        checkout: &Checkout,
        repo: &GitopsRepo,
        file: &Path,
        message: &str,
    ) -> Result<(), GitOpsError>;
}

/// Identity and credentials for [`GitCli`].
#[derive(Debug, Clone)]
pub struct GitCliConfig {
    /// Private key used for SSH remotes.
    pub ssh_key_path: Option<PathBuf>,
    /// Commit author name.
    pub author_name: String,
    /// Commit author email.
    pub author_email: String,
}

impl Default for GitCliConfig {
    fn default() -> Self {
        Self {
            ssh_key_path: None,
            author_name: "argo-watcher".to_string(),
            author_email: "argo-watcher@localhost".to_string(),
        }
    }
}

/// [`GitClient`] running the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    config: GitCliConfig,
}

impl GitCli {
    /// Creates a client.
    #[must_use]
    pub const fn new(config: GitCliConfig) -> Self {
        Self { config }
    }

    fn ssh_command(&self) -> Option<String> {
        self.config.ssh_key_path.as_ref().map(|key| {
            format!(
                "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
                shell_quote(&key.display().to_string())
            )
        })
    }

    async fn run<I, S>(&self, cwd: &Path, args: I) -> Result<String, GitOpsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(ssh) = self.ssh_command() {
            cmd.env("GIT_SSH_COMMAND", ssh);
        }

        let out = cmd.output().await?;
        if !out.status.success() {
            return Err(GitOpsError::Git(format!(
                "{:?} exited with {}: {}",
                cmd.as_std().get_args().collect::<Vec<_>>(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

#[async_trait]
impl GitClient for GitCli {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn checkout(&self, repo: &GitopsRepo) -> Result<Checkout, GitOpsError> {
        let dir = tempfile::tempdir()?;
        self.run(
            dir.path(),
            [
                OsStr::new("clone"),
                OsStr::new("--depth"),
                OsStr::new("1"),
                OsStr::new("--branch"),
                OsStr::new(&repo.branch),
                OsStr::new("--"),
                OsStr::new(&repo.repo_url),
                dir.path().as_os_str(),
            ],
        )
        .await?;
        debug!(path = %dir.path().display(), "Repository cloned");
        Ok(Checkout::new(dir))
    }

    #[instrument(skip(self, checkout, message), fields(repo = %repo, file = %file.display()))]
    async fn commit_and_push(
        &self,
        checkout: &Checkout,
        repo: &GitopsRepo,
        file: &Path,
        message: &str,
    ) -> Result<(), GitOpsError> {
        let root = checkout.path();
        self.run(root, [OsStr::new("add"), OsStr::new("--"), file.as_os_str()])
            .await?;

        let name = format!("user.name={}", self.config.author_name);
        let email = format!("user.email={}", self.config.author_email);
        self.run(root, ["-c", name.as_str(), "-c", email.as_str(), "commit", "-m", message])
            .await?;

        let refspec = format!("HEAD:refs/heads/{}", repo.branch);
        self.run(root, ["push", "origin", refspec.as_str()]).await?;
        Ok(())
    }
}

/// Single-quotes `value` for the shell that runs `GIT_SSH_COMMAND`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .await
            .is_ok_and(|out| out.status.success())
    }

    async fn git(cwd: &Path, args: &[&str]) -> anyhow::Result<String> {
        let out = Command::new("git").args(args).current_dir(cwd).output().await?;
        anyhow::ensure!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    #[test]
    fn test_ssh_command_uses_key() {
        let cli = GitCli::new(GitCliConfig {
            ssh_key_path: Some(PathBuf::from("/etc/watcher/id_ed25519")),
            ..GitCliConfig::default()
        });
        let ssh = cli.ssh_command().unwrap();
        assert!(ssh.starts_with("ssh -i '/etc/watcher/id_ed25519' "));
        assert!(GitCli::default().ssh_command().is_none());
    }

    #[test]
    fn test_ssh_key_path_is_quoted() {
        let cli = GitCli::new(GitCliConfig {
            ssh_key_path: Some(PathBuf::from("/run/secrets/git key's")),
            ..GitCliConfig::default()
        });
        let ssh = cli.ssh_command().unwrap();
        assert!(ssh.starts_with(r"ssh -i '/run/secrets/git key'\''s' "));
    }

    #[tokio::test]
    async fn test_option_like_url_is_treated_as_repository() -> anyhow::Result<()> {
        if !git_available().await {
            return Ok(());
        }

        let marker = tempfile::tempdir()?;
        let touched = marker.path().join("touched");
        let repo = GitopsRepo {
            repo_url: format!("--upload-pack=touch {}", touched.display()),
            branch: "main".to_string(),
            path: "apps".to_string(),
        };

        assert!(GitCli::default().checkout(&repo).await.is_err());
        assert!(!touched.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_commit_and_push_to_local_remote() -> anyhow::Result<()> {
        if !git_available().await {
            return Ok(());
        }

        let origin = tempfile::tempdir()?;
        let seed = origin.path().join("seed");
        let bare = origin.path().join("gitops.git");
        std::fs::create_dir_all(seed.join("apps/demo"))?;
        std::fs::write(seed.join("apps/demo/values.yaml"), "replicaCount: 1\n")?;
        git(&seed, &["init", "-q"]).await?;
        git(&seed, &["checkout", "-q", "-b", "main"]).await?;
        git(&seed, &["add", "."]).await?;
        git(
            &seed,
            &["-c", "user.name=t", "-c", "user.email=t@t", "commit", "-q", "-m", "seed"],
        )
        .await?;
        git(
            origin.path(),
            &["clone", "-q", "--bare", "seed", "gitops.git"],
        )
        .await?;

        let repo = GitopsRepo::new(bare.display().to_string(), "main", "apps/demo")?;
        let cli = GitCli::default();
        let checkout = cli.checkout(&repo).await?;
        assert!(checkout.path().join("apps/demo/values.yaml").exists());

        let file = Path::new("apps/demo/.argocd-source-demo.yaml");
        std::fs::write(checkout.path().join(file), "helm:\n  parameters: []\n")?;
        cli.commit_and_push(&checkout, &repo, file, "update demo")
            .await?;

        let log = git(&bare, &["log", "--format=%s|%an", "-1", "main"]).await?;
        assert_eq!(log, "update demo|argo-watcher");
        Ok(())
    }
}
