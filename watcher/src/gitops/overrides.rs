//! The `.argocd-source-{app}.yaml` parameter override file.
//!
//! Argo CD merges this file into the Helm parameters of the application.
//! Keys the watcher does not manage are carried through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// File name of the override file of `app`.
#[must_use]
pub fn override_file_name(app: &str) -> String {
    format!(".argocd-source-{app}.yaml")
}

/// Helm parameter name holding the tag of `alias`.
#[must_use]
pub fn image_tag_parameter(alias: &str) -> String {
    format!("{alias}.image.tag")
}

/// One Helm parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmParameter {
    /// Dotted value path.
    pub name: String,
    /// Value.
    pub value: String,
    /// Keeps numeric-looking values as strings.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forcestring: bool,
}

impl HelmParameter {
    /// A string-forced parameter.
    #[must_use]
    pub fn forced(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            forcestring: true,
        }
    }
}

/// Helm section of the override file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmOverrides {
    /// Parameters, in file order.
    #[serde(default)]
    pub parameters: Vec<HelmParameter>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Parsed override file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideFile {
    /// Helm overrides.
    #[serde(default)]
    pub helm: HelmOverrides,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl OverrideFile {
    /// Parses file contents; blank contents yield an empty file.
    ///
    /// # Errors
    ///
    /// Returns an error if the contents are not a valid override file.
    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Serializes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Merges `parameters` by name. Returns `true` if anything changed.
    pub fn apply(&mut self, parameters: &[HelmParameter]) -> bool {
        let mut changed = false;
        for parameter in parameters {
            match self
                .helm
                .parameters
                .iter_mut()
                .find(|existing| existing.name == parameter.name)
            {
                Some(existing) if existing == parameter => {}
                Some(existing) => {
                    *existing = parameter.clone();
                    changed = true;
                }
                None => {
                    self.helm.parameters.push(parameter.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}
