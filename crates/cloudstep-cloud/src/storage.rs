//! Staging uploads of source archives.
//!
//! Two variants, chosen by platform:
//! - [`BucketStager`] streams the archive into a Cloud Storage object (App Engine).
//! - [`SignedUrlStager`] asks the control plane for a single-use upload URL
//!   and PUTs the archive there (Cloud Functions).
//!
//! Neither deletes anything afterwards. The local archive belongs to the caller.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Method};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::rest::{ApiError, RestClient};

const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Where a staged archive ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingReference {
    Object { bucket: String, object: String },
    SignedUrl {
        upload_url: String,
        bucket: String,
        object: String,
    },
}

impl StagingReference {
    pub fn bucket(&self) -> &str {
        match self {
            Self::Object { bucket, .. } | Self::SignedUrl { bucket, .. } => bucket,
        }
    }

    pub fn object(&self) -> &str {
        match self {
            Self::Object { object, .. } | Self::SignedUrl { object, .. } => object,
        }
    }

    /// `gs://bucket/object`
    pub fn gcs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket(), self.object())
    }

    /// HTTPS form App Engine accepts as a zip `sourceUrl`.
    pub fn https_url(&self) -> String {
        format!(
            "https://storage.googleapis.com/{}/{}",
            self.bucket(),
            self.object()
        )
    }
}

/// Uploads a local archive and reports where it went.
#[allow(async_fn_in_trait)]
pub trait Stager: Send + Sync {
    async fn stage(&self, archive: &Path) -> Result<StagingReference, StagingError>;
}

impl<T: Stager> Stager for &T {
    async fn stage(&self, archive: &Path) -> Result<StagingReference, StagingError> {
        (**self).stage(archive).await
    }
}

// ── Bucket upload ──

/// Streams archives into `bucket/object` through the Cloud Storage JSON API.
pub struct BucketStager {
    client: RestClient,
    bucket: String,
    object: String,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    bucket: String,
    name: String,
}

impl BucketStager {
    /// `client` must be rooted at the storage endpoint (`https://storage.googleapis.com/`).
    pub fn new(client: RestClient, bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

impl Stager for BucketStager {
    async fn stage(&self, archive: &Path) -> Result<StagingReference, StagingError> {
        let (body, len) = file_body(archive).await?;
        let path = format!("upload/storage/v1/b/{}/o", self.bucket);

        let (url, builder) = self
            .client
            .request(Method::POST, &path)
            .await
            .map_err(|e| self.upload_error(e))?;
        let builder = builder
            .query(&[("uploadType", "media"), ("name", self.object.as_str())])
            .header(CONTENT_TYPE, ZIP_CONTENT_TYPE)
            .header(CONTENT_LENGTH, len)
            .body(body);

        // The object is committed when the response arrives; a failed commit
        // shows up here rather than while streaming.
        let stored: StoredObject = self
            .client
            .execute(url, builder)
            .await
            .map_err(|e| self.upload_error(e))?;

        tracing::info!(bucket = %stored.bucket, object = %stored.name, bytes = len, "staged archive");
        Ok(StagingReference::Object {
            bucket: stored.bucket,
            object: stored.name,
        })
    }
}

impl BucketStager {
    fn upload_error(&self, source: ApiError) -> StagingError {
        StagingError::Upload {
            target: format!("gs://{}/{}", self.bucket, self.object),
            source,
        }
    }
}

// ── Signed URL upload ──

/// A single-use upload URL plus the object it writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUpload {
    pub upload_url: String,
    pub bucket: String,
    pub object: String,
}

/// Control planes that hand out signed upload URLs.
#[allow(async_fn_in_trait)]
pub trait UploadUrlIssuer: Send + Sync {
    async fn issue_upload_url(&self, parent: &str) -> Result<SignedUpload, ApiError>;
}

impl<T: UploadUrlIssuer> UploadUrlIssuer for &T {
    async fn issue_upload_url(&self, parent: &str) -> Result<SignedUpload, ApiError> {
        (**self).issue_upload_url(parent).await
    }
}

pub struct SignedUrlStager<I> {
    issuer: I,
    parent: String,
    http: reqwest::Client,
}

impl<I: UploadUrlIssuer> SignedUrlStager<I> {
    pub fn new(issuer: I, parent: impl Into<String>) -> Self {
        Self::with_http(issuer, parent, reqwest::Client::new())
    }

    pub fn with_http(issuer: I, parent: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            issuer,
            parent: parent.into(),
            http,
        }
    }
}

impl<I: UploadUrlIssuer> Stager for SignedUrlStager<I> {
    async fn stage(&self, archive: &Path) -> Result<StagingReference, StagingError> {
        let signed = self
            .issuer
            .issue_upload_url(&self.parent)
            .await
            .map_err(|e| StagingError::IssueUrl {
                parent: self.parent.clone(),
                source: e,
            })?;

        upload_to_signed_url(&self.http, &signed.upload_url, archive).await?;

        tracing::info!(bucket = %signed.bucket, object = %signed.object, "staged archive via signed URL");
        Ok(StagingReference::SignedUrl {
            upload_url: signed.upload_url,
            bucket: signed.bucket,
            object: signed.object,
        })
    }
}

/// PUT the archive to a pre-signed URL. The URL carries its own credentials.
pub async fn upload_to_signed_url(
    http: &reqwest::Client,
    upload_url: &str,
    archive: &Path,
) -> Result<(), StagingError> {
    let (body, len) = file_body(archive).await?;

    let response = http
        .put(upload_url)
        .header(CONTENT_TYPE, ZIP_CONTENT_TYPE)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .send()
        .await
        .map_err(|e| StagingError::Transport {
            url: redact_query(upload_url),
            source: e.without_url(),
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response
        .text()
        .await
        .map_err(|e| StagingError::Transport {
            url: redact_query(upload_url),
            source: e.without_url(),
        })?;
    Err(StagingError::Rejected {
        status: status.as_u16(),
        body: body.trim().to_owned(),
    })
}

/// Streaming request body over a local file, plus its length.
async fn file_body(path: &Path) -> Result<(Body, u64), StagingError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| StagingError::ReadArchive {
            path: path.to_path_buf(),
            source: e,
        })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| StagingError::ReadArchive {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    Ok((Body::wrap_stream(ReaderStream::new(file)), len))
}

/// Signed URLs embed credentials in the query string; keep them out of errors.
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_owned(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to read archive {path}")]
    ReadArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to upload archive to {target}")]
    Upload { target: String, source: ApiError },

    #[error("failed to obtain an upload URL under {parent}")]
    IssueUrl { parent: String, source: ApiError },

    #[error("upload to {url} failed")]
    Transport { url: String, source: reqwest::Error },

    #[error("upload rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source directory {path} must be staged before building the resource")]
    NotStaged { path: String },

    #[error("{platform} cannot deploy a container image")]
    Unsupported { platform: &'static str },
}
