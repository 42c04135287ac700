//! Minimal JSON-over-HTTPS transport for Google control-plane APIs.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{AccessToken, AuthError};

/// Authenticated client rooted at one API base URL (e.g. `https://appengine.googleapis.com/v1/`).
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    token: Arc<AccessToken>,
}

impl RestClient {
    pub fn new(base: &str, token: Arc<AccessToken>) -> Result<Self, ApiError> {
        Self::with_http(reqwest::Client::new(), base, token)
    }

    pub fn with_http(
        http: reqwest::Client,
        base: &str,
        token: Arc<AccessToken>,
    ) -> Result<Self, ApiError> {
        // Url::join drops the last segment unless the base ends in '/'.
        let normalized = if base.ends_with('/') {
            base.to_owned()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl {
            url: base.to_owned(),
            source: e,
        })?;
        Ok(Self { http, base, token })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a resource path (no leading `/`) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl {
                url: path.to_owned(),
                source: e,
            })
    }

    /// Authenticated request builder for `path`.
    pub async fn request(&self, method: Method, path: &str) -> Result<(Url, RequestBuilder), ApiError> {
        let url = self.url(path)?;
        let token = self
            .token
            .bearer()
            .await
            .map_err(|e| ApiError::Auth { source: e })?;
        let builder = self.http.request(method, url.clone()).bearer_auth(token);
        Ok((url, builder))
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let (url, builder) = self.request(Method::GET, path).await?;
        self.execute(url, builder).await
    }

    pub async fn post<B, R>(&self, path: &str, query: &[(&str, &str)], body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (url, builder) = self.request(Method::POST, path).await?;
        self.execute(url, builder.query(query).json(body)).await
    }

    pub async fn patch<B, R>(&self, path: &str, query: &[(&str, &str)], body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let (url, builder) = self.request(Method::PATCH, path).await?;
        self.execute(url, builder.query(query).json(body)).await
    }

    /// Send the request and decode a JSON body, mapping Google error payloads.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        url: Url,
        builder: RequestBuilder,
    ) -> Result<R, ApiError> {
        tracing::debug!(%url, "sending request");
        let response = builder.send().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(ApiError::from_response(url.as_str(), status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

/// `{"error": {...}}` envelope used by Google APIs.
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("request to {url} failed with HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("request to {url} failed")]
    Transport { url: String, source: reqwest::Error },

    #[error("unexpected response body from {url}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("invalid URL {url}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("authentication failed")]
    Auth { source: AuthError },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status of a rejected request, if the server answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND.as_u16()),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_response(url: &str, status: StatusCode, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<ErrorEnvelope>(body).ok();
        let not_found = status == StatusCode::NOT_FOUND
            || parsed
                .as_ref()
                .and_then(|e| e.error.status.as_deref())
                .is_some_and(|s| s == "NOT_FOUND");

        if not_found {
            return Self::NotFound {
                url: url.to_owned(),
            };
        }

        let message = match parsed {
            Some(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
            _ => String::from_utf8_lossy(body).trim().to_owned(),
        };
        Self::Status {
            url: url.to_owned(),
            status: status.as_u16(),
            message,
        }
    }
}
