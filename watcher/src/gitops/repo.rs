//! Resolution of the GitOps repository an application is deployed from.

use std::fmt;
use std::path::{Component, Path};

use super::GitOpsError;
use crate::argo::{Application, WatcherAnnotations};

/// Location of the override file of a managed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitopsRepo {
    /// Repository URL.
    pub repo_url: String,
    /// Branch to commit to.
    pub branch: String,
    /// Directory holding the override file.
    pub path: String,
}

impl GitopsRepo {
    /// Builds a repo location.
    ///
    /// The path must stay inside the checkout, and neither the URL nor the
    /// branch may start with `-`.
    ///
    /// # Errors
    ///
    /// Returns [`GitOpsError::Unresolvable`] naming the first empty or
    /// rejected field.
    pub fn new(
        repo_url: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, GitOpsError> {
        let repo = Self {
            repo_url: repo_url.into().trim().to_string(),
            branch: branch.into().trim().to_string(),
            path: path.into().trim().to_string(),
        };

        for (field, value) in [
            ("repository URL", &repo.repo_url),
            ("branch", &repo.branch),
            ("path", &repo.path),
        ] {
            if value.is_empty() {
                return Err(GitOpsError::Unresolvable(format!("{field} is empty")));
            }
        }
        for (field, value) in [("repository URL", &repo.repo_url), ("branch", &repo.branch)] {
            if value.starts_with('-') {
                return Err(GitOpsError::Unresolvable(format!(
                    "{field} {value:?} starts with '-'"
                )));
            }
        }
        if !is_contained(&repo.path) {
            return Err(GitOpsError::Unresolvable(format!(
                "path {:?} leaves the repository root",
                repo.path
            )));
        }
        Ok(repo)
    }

    /// Resolves the repository of `app`.
    ///
    /// Annotation overrides win field by field; remaining fields come from the
    /// single source of the application. Multi-source applications must
    /// provide every field through annotations.
    ///
    /// # Errors
    ///
    /// Returns [`GitOpsError::Unresolvable`] if a field cannot be determined.
    pub fn resolve(app: &Application, annotations: &WatcherAnnotations) -> Result<Self, GitOpsError> {
        let source = app.single_source();
        let overrides = &annotations.write_back;

        let pick = |explicit: &Option<String>, from_source: Option<&String>| {
            explicit
                .clone()
                .or_else(|| from_source.cloned())
                .unwrap_or_default()
        };

        Self::new(
            pick(&overrides.repo_url, source.map(|s| &s.repo_url)),
            pick(&overrides.branch, source.map(|s| &s.target_revision)),
            pick(&overrides.path, source.map(|s| &s.path)),
        )
    }
}

/// Relative path made of plain components only.
fn is_contained(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl fmt::Display for GitopsRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.repo_url, self.branch, self.path)
    }
}
