pub mod appengine;
pub mod functions;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cloudstep_cloud::{AccessToken, CancelScope, Poller, RestClient};
use cloudstep_core::{Provenance, StepConfig};
use tokio_util::sync::CancellationToken;

/// Settings and credentials shared by every subcommand.
pub struct Context {
    pub config: StepConfig,
    token: Arc<AccessToken>,
    cancel: CancellationToken,
}

impl Context {
    pub fn load(config_path: Option<&Path>, access_token: Option<String>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => StepConfig::load_file(path)?,
            None => StepConfig::load(&PathBuf::from("."))?,
        };

        // Nothing is fetched here; gcloud runs on the first authenticated request.
        let token = match access_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => AccessToken::fixed(token.trim()),
            None => AccessToken::from_gcloud(),
        };

        Ok(Self {
            config,
            token: Arc::new(token),
            cancel: CancellationToken::new(),
        })
    }

    /// Cancel in-flight waits when the user hits Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    /// Cancellation scope bounded by `timeout_secs`, or the configured timeout.
    pub fn scope(&self, timeout_secs: Option<u64>) -> CancelScope {
        let timeout = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.deploy.timeout());
        CancelScope::new(self.cancel.clone()).with_timeout(timeout)
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.config.deploy.poll_interval())
    }

    pub fn rest(&self, base: &str) -> anyhow::Result<RestClient> {
        Ok(RestClient::new(base, self.token.clone())?)
    }

    /// `--project`, falling back to `[project].id`. Empty when neither is set,
    /// which request validation reports as a missing project.
    pub fn project(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.config.project.id.clone())
            .unwrap_or_default()
    }

    pub fn region(&self, flag: Option<String>) -> String {
        flag.unwrap_or_else(|| self.config.project.region.clone())
    }
}

/// Fail early when the provenance destination is already taken; the record is
/// only written after the work is done.
pub fn check_provenance(destination: Option<&Path>) -> anyhow::Result<()> {
    match destination {
        Some(path) if path.exists() => Err(cloudstep_core::Error::ProvenanceExists {
            path: path.to_path_buf(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// Write a provenance record when a destination was requested.
pub fn write_provenance(
    destination: Option<&Path>,
    uri: &str,
    digest: &str,
) -> anyhow::Result<()> {
    if let Some(path) = destination {
        Provenance::build_artifact(uri, digest).write(path)?;
        println!("Provenance written to {}", path.display());
    }
    Ok(())
}
