//! Validated deploy request, assembled once from CLI options and the manifest.
//!
//! Every check here runs before any network call: a request that fails to
//! build never reaches the control plane.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::manifest::DEFAULT_SERVICE;

/// Where the deployable artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploySource {
    /// Prebuilt container image URL.
    ContainerImage(String),
    /// Local directory to archive and stage.
    Directory(PathBuf),
    /// Archive already uploaded to object storage.
    StorageObject { bucket: String, object: String },
}

/// Immutable deploy request.
///
/// # Examples
///
/// ```
/// use cloudstep_core::{DeployRequest, DeploySource};
///
/// let request = DeployRequest::builder("my-project")
///     .runtime("go122")
///     .image("us-docker.pkg.dev/my-project/app/web:1")
///     .labels(["team=web"])
///     .build()
///     .unwrap();
///
/// assert_eq!(request.resource_name(), "default");
/// assert!(matches!(request.source(), DeploySource::ContainerImage(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    project_id: String,
    region: String,
    resource_name: String,
    runtime: String,
    entry_point: Option<String>,
    source: DeploySource,
    labels: BTreeMap<String, String>,
    env_variables: BTreeMap<String, String>,
    version_id: Option<String>,
    promote: bool,
}

impl DeployRequest {
    pub fn builder(project_id: impl Into<String>) -> DeployRequestBuilder {
        DeployRequestBuilder::new(project_id.into())
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Service (App Engine) or function (Cloud Functions) identifier.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    pub fn source(&self) -> &DeploySource {
        &self.source
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn env_variables(&self) -> &BTreeMap<String, String> {
        &self.env_variables
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    pub fn promote(&self) -> bool {
        self.promote
    }

    /// The same request deploying as `version_id`.
    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// Collects raw option values; [`DeployRequestBuilder::build`] validates them.
#[derive(Debug, Clone)]
pub struct DeployRequestBuilder {
    project_id: String,
    region: String,
    resource_name: Option<String>,
    runtime: Option<String>,
    entry_point: Option<String>,
    image: Option<String>,
    source_dir: Option<PathBuf>,
    labels: Vec<String>,
    env: Vec<String>,
    env_variables: BTreeMap<String, String>,
    version_id: Option<String>,
    promote: bool,
    reserved_label_prefix: String,
}

impl DeployRequestBuilder {
    fn new(project_id: String) -> Self {
        Self {
            project_id,
            region: "us-central1".to_owned(),
            resource_name: None,
            runtime: None,
            entry_point: None,
            image: None,
            source_dir: None,
            labels: Vec::new(),
            env: Vec::new(),
            env_variables: BTreeMap::new(),
            version_id: None,
            promote: true,
            reserved_label_prefix: "deployment".to_owned(),
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    pub fn entry_point(mut self, entry_point: Option<String>) -> Self {
        self.entry_point = entry_point;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// A local directory, or a `gs://bucket/object` URI of an uploaded archive.
    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(source.into());
        self
    }

    pub fn labels<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn env<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Already parsed environment variables, e.g. from a manifest. Kept
    /// verbatim; `key=value` entries given through [`Self::env`] win on
    /// conflict.
    pub fn env_variables(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env_variables
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn promote(mut self, promote: bool) -> Self {
        self.promote = promote;
        self
    }

    /// Prefix that user label keys must not start with. Empty disables the check.
    pub fn reserved_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_label_prefix = prefix.into();
        self
    }

    pub fn build(self) -> crate::Result<DeployRequest> {
        let project_id = non_empty(Some(self.project_id)).ok_or(crate::Error::MissingField {
            field: "project",
        })?;
        let region = non_empty(Some(self.region))
            .ok_or(crate::Error::MissingField { field: "region" })?;
        let runtime = non_empty(self.runtime).ok_or(crate::Error::RuntimeRequired)?;
        let resource_name =
            non_empty(self.resource_name).unwrap_or_else(|| DEFAULT_SERVICE.to_owned());

        let source = resolve_source(non_empty(self.image), self.source_dir)?;

        let labels = parse_pairs("label", &self.labels)?;
        validate_labels(&labels, &self.reserved_label_prefix)?;
        let mut env_variables = self.env_variables;
        env_variables.extend(parse_pairs("environment variable", &self.env)?);

        Ok(DeployRequest {
            project_id,
            region,
            resource_name,
            runtime,
            entry_point: non_empty(self.entry_point),
            source,
            labels,
            env_variables,
            version_id: non_empty(self.version_id),
            promote: self.promote,
        })
    }
}

/// Parse `key=value` entries. Values may be empty; keys may not.
pub fn parse_pairs(
    kind: &'static str,
    entries: &[String],
) -> crate::Result<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(crate::Error::MalformedPair {
                kind,
                entry: entry.clone(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(crate::Error::MalformedPair {
                kind,
                entry: entry.clone(),
            });
        }
        pairs.insert(key.to_owned(), value.trim().to_owned());
    }
    Ok(pairs)
}

/// Reject label keys that start with the reserved prefix (case-sensitive).
pub fn validate_labels(labels: &BTreeMap<String, String>, reserved_prefix: &str) -> crate::Result<()> {
    if reserved_prefix.is_empty() {
        return Ok(());
    }
    match labels.keys().find(|key| key.starts_with(reserved_prefix)) {
        Some(key) => Err(crate::Error::ReservedLabel {
            key: key.clone(),
            prefix: reserved_prefix.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Split a `gs://bucket/object` URI.
pub fn parse_storage_uri(uri: &str) -> crate::Result<(String, String)> {
    uri.strip_prefix("gs://")
        .and_then(|rest| rest.split_once('/'))
        .filter(|(bucket, object)| !bucket.is_empty() && !object.is_empty())
        .map(|(bucket, object)| (bucket.to_owned(), object.to_owned()))
        .ok_or_else(|| crate::Error::MalformedStorageUri {
            uri: uri.to_owned(),
        })
}

fn resolve_source(image: Option<String>, source: Option<PathBuf>) -> crate::Result<DeploySource> {
    match (image, source) {
        (Some(_), Some(_)) => Err(crate::Error::SourceConflict),
        (None, None) => Err(crate::Error::SourceMissing),
        (Some(image), None) => Ok(DeploySource::ContainerImage(image)),
        (None, Some(path)) => {
            if let Some(uri) = path.to_str().filter(|p| p.starts_with("gs://")) {
                let (bucket, object) = parse_storage_uri(uri)?;
                return Ok(DeploySource::StorageObject { bucket, object });
            }
            if !path.is_dir() {
                return Err(crate::Error::SourceNotDirectory { path });
            }
            Ok(DeploySource::Directory(path))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
