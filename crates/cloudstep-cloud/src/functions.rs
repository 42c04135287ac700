//! Cloud Functions v2 control plane.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use cloudstep_core::{DeployRequest, DeploySource};

use crate::operation::Operation;
use crate::plane::{ControlPlane, OperationSource};
use crate::rest::{ApiError, RestClient};
use crate::storage::{SignedUpload, SourceError, StagingReference, UploadUrlIssuer};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_config: Option<BuildConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_config: Option<ServiceConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default)]
    pub runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub storage_source: StorageSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSource {
    pub bucket: String,
    pub object: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
}

/// `projects/{project}/locations/{region}`
pub fn location_name(project: &str, region: &str) -> String {
    format!("projects/{project}/locations/{region}")
}

/// `projects/{project}/locations/{region}/functions/{function}`
pub fn function_name(project: &str, region: &str, function: &str) -> String {
    format!("{}/functions/{function}", location_name(project, region))
}

/// Function resource for `request`, sourced from `staged` when a local
/// directory was uploaded first.
pub fn build_function(
    request: &DeployRequest,
    staged: Option<&StagingReference>,
) -> Result<Function, SourceError> {
    let storage_source = match (request.source(), staged) {
        (DeploySource::ContainerImage(_), _) => {
            return Err(SourceError::Unsupported {
                platform: "Cloud Functions",
            });
        }
        (_, Some(staged)) => StorageSource {
            bucket: staged.bucket().to_owned(),
            object: staged.object().to_owned(),
        },
        (DeploySource::StorageObject { bucket, object }, None) => StorageSource {
            bucket: bucket.clone(),
            object: object.clone(),
        },
        (DeploySource::Directory(dir), None) => {
            return Err(SourceError::NotStaged {
                path: dir.display().to_string(),
            });
        }
    };

    Ok(Function {
        build_config: Some(BuildConfig {
            runtime: request.runtime().to_owned(),
            entry_point: request.entry_point().map(str::to_owned),
            source: Some(Source { storage_source }),
        }),
        service_config: Some(ServiceConfig {
            environment_variables: request.env_variables().clone(),
        }),
        labels: request.labels().clone(),
        ..Function::default()
    })
}

/// REST client for the Cloud Functions v2 API.
#[derive(Clone)]
pub struct FunctionsApi {
    rest: RestClient,
}

impl FunctionsApi {
    /// `rest` must be rooted at `https://cloudfunctions.googleapis.com/v2/`.
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

impl OperationSource for FunctionsApi {
    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        self.rest.get(name).await
    }
}

impl ControlPlane for FunctionsApi {
    type Resource = Function;

    async fn get_resource(&self, name: &str) -> Result<Function, ApiError> {
        self.rest.get(name).await
    }

    async fn create_resource(
        &self,
        parent: &str,
        id: &str,
        resource: &Function,
    ) -> Result<Operation, ApiError> {
        self.rest
            .post(&format!("{parent}/functions"), &[("functionId", id)], resource)
            .await
    }

    async fn update_resource(&self, name: &str, resource: &Function) -> Result<Operation, ApiError> {
        self.rest.patch(name, &[], resource).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    storage_source: StorageSource,
}

impl UploadUrlIssuer for FunctionsApi {
    async fn issue_upload_url(&self, parent: &str) -> Result<SignedUpload, ApiError> {
        let response: UploadUrlResponse = self
            .rest
            .post(&format!("{parent}/functions:generateUploadUrl"), &[], &json!({}))
            .await?;
        Ok(SignedUpload {
            upload_url: response.upload_url,
            bucket: response.storage_source.bucket,
            object: response.storage_source.object,
        })
    }
}
