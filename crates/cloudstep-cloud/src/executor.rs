/// Abstraction over gcloud CLI execution for testability.
///
/// Only used to obtain credentials; all deploy traffic goes through the REST
/// clients. Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait GcloudExecutor: Send + Sync {
    /// Execute a gcloud command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;
}

/// Real gcloud CLI executor.
pub struct RealExecutor;

impl GcloudExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError> {
        use std::process::Stdio;

        let output = tokio::process::Command::new("gcloud")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GcloudError::NotFound { source: e })?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| GcloudError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GcloudError {
    #[error("gcloud CLI not found (install the Cloud SDK or pass --access-token)")]
    NotFound { source: std::io::Error },

    #[error("gcloud {} failed: {stderr}", .args.join(" "))]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("gcloud printed non-UTF-8 output")]
    InvalidUtf8 { source: std::string::FromUtf8Error },
}
