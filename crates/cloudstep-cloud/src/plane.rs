//! Capability traits over remote control planes.
//!
//! The orchestrator and poller only see these traits; the App Engine and
//! Cloud Functions clients implement them over REST, tests implement them
//! with in-memory fakes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::operation::Operation;
use crate::rest::ApiError;

/// Re-fetches long-running operations by name.
#[allow(async_fn_in_trait)]
pub trait OperationSource: Send + Sync {
    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError>;
}

/// Create/update surface for one resource kind.
#[allow(async_fn_in_trait)]
pub trait ControlPlane: OperationSource {
    type Resource: Serialize + DeserializeOwned + Send + Sync;

    /// Fetch a resource; a missing resource is [`ApiError::NotFound`].
    async fn get_resource(&self, name: &str) -> Result<Self::Resource, ApiError>;

    async fn create_resource(
        &self,
        parent: &str,
        id: &str,
        resource: &Self::Resource,
    ) -> Result<Operation, ApiError>;

    async fn update_resource(
        &self,
        name: &str,
        resource: &Self::Resource,
    ) -> Result<Operation, ApiError>;
}

/// Traffic routing between versions of a service.
#[allow(async_fn_in_trait)]
pub trait TrafficControl: OperationSource {
    /// Replace the service's traffic split with `allocations` (version id → share).
    async fn update_traffic_split(
        &self,
        service: &str,
        allocations: &BTreeMap<String, f64>,
    ) -> Result<Operation, ApiError>;
}

impl<T: OperationSource> OperationSource for &T {
    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        (**self).get_operation(name).await
    }
}

impl<T: ControlPlane> ControlPlane for &T {
    type Resource = T::Resource;

    async fn get_resource(&self, name: &str) -> Result<Self::Resource, ApiError> {
        (**self).get_resource(name).await
    }

    async fn create_resource(
        &self,
        parent: &str,
        id: &str,
        resource: &Self::Resource,
    ) -> Result<Operation, ApiError> {
        (**self).create_resource(parent, id, resource).await
    }

    async fn update_resource(
        &self,
        name: &str,
        resource: &Self::Resource,
    ) -> Result<Operation, ApiError> {
        (**self).update_resource(name, resource).await
    }
}

impl<T: TrafficControl> TrafficControl for &T {
    async fn update_traffic_split(
        &self,
        service: &str,
        allocations: &BTreeMap<String, f64>,
    ) -> Result<Operation, ApiError> {
        (**self).update_traffic_split(service, allocations).await
    }
}
