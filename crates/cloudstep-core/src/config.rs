use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the optional configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "cloudstep.toml";

/// cloudstep.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// GCP project ID (a `--project` flag takes precedence)
    pub id: Option<String>,
    /// GCP region (defaults to us-central1)
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Delay between long-running operation polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on waiting for an operation to finish
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Label-key prefix the control plane reserves for itself
    #[serde(default = "default_reserved_label_prefix")]
    pub reserved_label_prefix: String,
    /// Bucket receiving App Engine source archives.
    /// Defaults to `staging.<project>.appspot.com`.
    pub staging_bucket: Option<String>,
}

/// Base URL overrides, mostly useful for emulators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_appengine_endpoint")]
    pub appengine: String,
    #[serde(default = "default_functions_endpoint")]
    pub functions: String,
    #[serde(default = "default_storage_endpoint")]
    pub storage: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: None,
            region: default_region(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
            reserved_label_prefix: default_reserved_label_prefix(),
            staging_bucket: None,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            appengine: default_appengine_endpoint(),
            functions: default_functions_endpoint(),
            storage: default_storage_endpoint(),
        }
    }
}

impl DeployConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Staging bucket for `project_id`, falling back to the App Engine default bucket.
    pub fn staging_bucket_for(&self, project_id: &str) -> String {
        self.staging_bucket
            .clone()
            .unwrap_or_else(|| format!("staging.{project_id}.appspot.com"))
    }
}

impl StepConfig {
    /// Load from cloudstep.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &std::path::Path) -> crate::Result<Self> {
        Self::load_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path, or return defaults if the file does not exist.
    pub fn load_file(config_path: &std::path::Path) -> crate::Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.to_path_buf(),
                source: e,
            })?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        // A zero interval would poll the control plane in a tight loop.
        if config.deploy.poll_interval_secs == 0 {
            return Err(crate::Error::ConfigOutOfRange {
                path: config_path.to_path_buf(),
                field: "deploy.poll_interval_secs",
            });
        }

        tracing::debug!(path = %config_path.display(), "loaded configuration");
        Ok(config)
    }
}

fn default_region() -> String {
    "us-central1".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_reserved_label_prefix() -> String {
    "deployment".to_owned()
}

fn default_appengine_endpoint() -> String {
    "https://appengine.googleapis.com/v1/".to_owned()
}

fn default_functions_endpoint() -> String {
    "https://cloudfunctions.googleapis.com/v2/".to_owned()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com/".to_owned()
}
