//! `app.yaml` manifest for App Engine flexible deployments.
//!
//! Only the fields the deploy step needs are modelled; anything else in the
//! file is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Service name App Engine uses when the manifest does not set one.
pub const DEFAULT_SERVICE: &str = "default";

/// Accepted values for the `env` field.
const FLEX_ENVS: &[&str] = &["flex", "flexible"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppManifest {
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
    /// Shell command App Engine runs to start the app
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub env_variables: BTreeMap<String, String>,
}

impl AppManifest {
    /// Read and parse a manifest file. Validation is a separate step.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ManifestRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| crate::Error::ManifestParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Check the fields a flexible-environment deploy depends on.
    pub fn validate_flex(&self) -> crate::Result<()> {
        if self.runtime().is_none() {
            return Err(crate::Error::RuntimeRequired);
        }

        match self.env.as_deref() {
            Some(env) if FLEX_ENVS.contains(&env) => Ok(()),
            other => Err(crate::Error::UnsupportedEnv {
                env: other.map(str::to_owned),
            }),
        }
    }

    /// Trimmed runtime, `None` when missing or blank.
    pub fn runtime(&self) -> Option<&str> {
        self.runtime
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn service_name(&self) -> &str {
        self.service
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_defaults_when_blank() {
        let manifest = AppManifest {
            service: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(manifest.service_name(), "default");
    }

    #[test]
    fn whitespace_runtime_counts_as_missing() {
        let manifest = AppManifest {
            runtime: Some("   ".to_owned()),
            env: Some("flex".to_owned()),
            ..Default::default()
        };
        assert!(matches!(
            manifest.validate_flex(),
            Err(crate::Error::RuntimeRequired)
        ));
    }
}
