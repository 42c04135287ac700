//! App Engine Admin API v1 control plane.
//!
//! Versions are the deployable resource:
//! `apps/{project}/services/{service}/versions/{version}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use cloudstep_core::{AppManifest, DeployRequest, DeploySource};

use crate::operation::Operation;
use crate::plane::{ControlPlane, OperationSource, TrafficControl};
use crate::rest::{ApiError, RestClient};
use crate::storage::{SourceError, StagingReference};

/// The only environment cloudstep deploys to.
pub const FLEXIBLE_ENV: &str = "flexible";
const SERVING: &str = "SERVING";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Entrypoint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrypoint {
    pub shell: String,
}

/// Exactly one of `container` or `zip` is set on versions we build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<ZipInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipInfo {
    pub source_url: String,
}

/// `apps/{project}/services/{service}`
pub fn service_name(project: &str, service: &str) -> String {
    format!("apps/{project}/services/{service}")
}

/// `apps/{project}/services/{service}/versions/{version}`
pub fn version_name(project: &str, service: &str, version: &str) -> String {
    format!("{}/versions/{version}", service_name(project, service))
}

/// Version resource for `request`.
///
/// The source comes from the request for container images and storage
/// objects, or from `staged` when a local directory was uploaded first.
pub fn build_version(
    request: &DeployRequest,
    manifest: &AppManifest,
    staged: Option<&StagingReference>,
) -> Result<Version, SourceError> {
    let deployment = match (request.source(), staged) {
        (DeploySource::ContainerImage(image), _) => Deployment {
            container: Some(ContainerInfo {
                image: image.clone(),
            }),
            zip: None,
        },
        (_, Some(staged)) => zip_deployment(staged.https_url()),
        (DeploySource::StorageObject { bucket, object }, None) => zip_deployment(format!(
            "https://storage.googleapis.com/{bucket}/{object}"
        )),
        (DeploySource::Directory(dir), None) => {
            return Err(SourceError::NotStaged {
                path: dir.display().to_string(),
            });
        }
    };

    Ok(Version {
        id: request.version_id().unwrap_or_default().to_owned(),
        runtime: Some(request.runtime().to_owned()),
        env: Some(FLEXIBLE_ENV.to_owned()),
        entrypoint: request
            .entry_point()
            .or(manifest.entrypoint.as_deref())
            .map(|shell| Entrypoint {
                shell: shell.to_owned(),
            }),
        env_variables: request.env_variables().clone(),
        deployment: Some(deployment),
        serving_status: Some(SERVING.to_owned()),
        ..Version::default()
    })
}

/// Patch body for an existing version.
///
/// A deployed version's source and runtime settings are immutable, so only
/// the serving status is sent.
pub fn serving_update(version_id: &str) -> Version {
    Version {
        id: version_id.to_owned(),
        serving_status: Some(SERVING.to_owned()),
        ..Version::default()
    }
}

fn zip_deployment(source_url: String) -> Deployment {
    Deployment {
        container: None,
        zip: Some(ZipInfo { source_url }),
    }
}

/// REST client for the App Engine Admin API.
#[derive(Clone)]
pub struct AppEngineApi {
    rest: RestClient,
}

impl AppEngineApi {
    /// `rest` must be rooted at `https://appengine.googleapis.com/v1/`.
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

impl OperationSource for AppEngineApi {
    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        self.rest.get(name).await
    }
}

impl ControlPlane for AppEngineApi {
    type Resource = Version;

    async fn get_resource(&self, name: &str) -> Result<Version, ApiError> {
        self.rest.get(name).await
    }

    async fn create_resource(
        &self,
        parent: &str,
        id: &str,
        resource: &Version,
    ) -> Result<Operation, ApiError> {
        let mut body = resource.clone();
        body.id = id.to_owned();
        self.rest
            .post(&format!("{parent}/versions"), &[], &body)
            .await
    }

    async fn update_resource(&self, name: &str, resource: &Version) -> Result<Operation, ApiError> {
        self.rest
            .patch(name, &[("updateMask", "servingStatus")], resource)
            .await
    }
}

impl TrafficControl for AppEngineApi {
    async fn update_traffic_split(
        &self,
        service: &str,
        allocations: &BTreeMap<String, f64>,
    ) -> Result<Operation, ApiError> {
        let body = json!({ "split": { "allocations": allocations } });
        self.rest
            .patch(service, &[("updateMask", "split")], &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: &str) -> DeployRequest {
        DeployRequest::builder("p")
            .runtime("go122")
            .resource_name("api")
            .version_id("v1")
            .source(source)
            .build()
            .unwrap()
    }

    #[test]
    fn names() {
        assert_eq!(service_name("p", "api"), "apps/p/services/api");
        assert_eq!(version_name("p", "api", "v1"), "apps/p/services/api/versions/v1");
    }

    #[test]
    fn storage_object_becomes_zip_source() {
        let version =
            build_version(&request("gs://b/src.zip"), &AppManifest::default(), None).unwrap();
        let zip = version.deployment.unwrap().zip.unwrap();
        assert_eq!(zip.source_url, "https://storage.googleapis.com/b/src.zip");
        assert_eq!(version.env.as_deref(), Some(FLEXIBLE_ENV));
        assert_eq!(version.id, "v1");
    }

    #[test]
    fn unstaged_directory_is_rejected() {
        let dir = std::env::temp_dir();
        let err = build_version(
            &request(dir.to_str().unwrap()),
            &AppManifest::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::NotStaged { .. }));
    }

    #[test]
    fn manifest_entrypoint_is_used_when_flag_absent() {
        let manifest = AppManifest {
            entrypoint: Some("./server".to_owned()),
            ..AppManifest::default()
        };
        let version = build_version(&request("gs://b/o"), &manifest, None).unwrap();
        assert_eq!(version.entrypoint.unwrap().shell, "./server");
    }

    #[test]
    fn serving_update_carries_no_source() {
        let value = serde_json::to_value(serving_update("v1")).unwrap();
        assert_eq!(value, serde_json::json!({"id": "v1", "servingStatus": "SERVING"}));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let version =
            build_version(&request("gs://b/o"), &AppManifest::default(), None).unwrap();
        let value = serde_json::to_value(&version).unwrap();
        assert_eq!(value["servingStatus"], "SERVING");
        assert_eq!(value["deployment"]["zip"]["sourceUrl"], "https://storage.googleapis.com/b/o");
        assert!(value.get("name").is_none());
        assert!(value.get("envVariables").is_none());
    }
}
