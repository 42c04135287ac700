use tokio::sync::OnceCell;

use crate::executor::{GcloudError, GcloudExecutor, RealExecutor};

/// OAuth bearer token for Google APIs.
///
/// Either fixed up front (CI systems that inject a token) or fetched once
/// from `gcloud auth print-access-token` on first use and cached for the
/// rest of the invocation. Nothing is fetched until a request needs it, so
/// input validation never triggers a gcloud call.
pub struct AccessToken<E: GcloudExecutor = RealExecutor> {
    executor: E,
    fixed: Option<String>,
    cached: OnceCell<String>,
}

impl AccessToken<RealExecutor> {
    pub fn from_gcloud() -> Self {
        Self::with_executor(RealExecutor)
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            executor: RealExecutor,
            fixed: Some(token.into()),
            cached: OnceCell::new(),
        }
    }
}

impl<E: GcloudExecutor> AccessToken<E> {
    pub fn with_executor(executor: E) -> Self {
        Self {
            executor,
            fixed: None,
            cached: OnceCell::new(),
        }
    }

    pub async fn bearer(&self) -> Result<&str, AuthError> {
        if let Some(token) = &self.fixed {
            return Ok(token);
        }

        self.cached
            .get_or_try_init(|| async {
                let output = self
                    .executor
                    .exec(&["auth".to_owned(), "print-access-token".to_owned()])
                    .await
                    .map_err(|e| AuthError::Gcloud { source: e })?;
                let token = output.trim();
                if token.is_empty() {
                    return Err(AuthError::EmptyToken);
                }
                tracing::debug!("obtained access token from gcloud");
                Ok(token.to_owned())
            })
            .await
            .map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to obtain an access token (run `gcloud auth login`)")]
    Gcloud { source: GcloudError },

    #[error("gcloud returned an empty access token")]
    EmptyToken,
}
