//! Create-or-update of a control-plane resource, driven to completion.
//!
//! ```text
//! get_resource ──NotFound──▶ create_resource ─┐
//!      │                                      ├─▶ poll until done ─▶ Success(resource)
//!      └────Found──────────▶ update_resource ─┘                   └▶ Failure(code, message)
//!      └────other error ───▶ abort (never treated as "absent")
//! ```
//!
//! Each submit is attempted once. There is no retry on transport errors or
//! remote failures; the caller re-runs the whole step.

use std::collections::BTreeMap;

use crate::operation::OperationStatus;
use crate::plane::{ControlPlane, TrafficControl};
use crate::poll::{CancelScope, Poller, WaitError};
use crate::rest::ApiError;

/// What to deploy and where.
#[derive(Debug, Clone)]
pub struct DeployTarget<R> {
    /// Collection the resource is created in (e.g. `apps/p/services/s`)
    pub parent: String,
    /// Identifier within the parent (version id, function id)
    pub id: String,
    /// Full resource name used for lookups and updates
    pub name: String,
    pub resource: R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Created,
    Updated,
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("create"),
            Self::Updated => f.write_str("update"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deployed<R> {
    pub action: DeployAction,
    /// Final resource snapshot from the finished operation
    pub resource: R,
}

pub struct Orchestrator<P> {
    plane: P,
    poller: Poller,
}

impl<P: ControlPlane> Orchestrator<P> {
    pub fn new(plane: P) -> Self {
        Self::with_poller(plane, Poller::default())
    }

    pub fn with_poller(plane: P, poller: Poller) -> Self {
        Self { plane, poller }
    }

    pub fn plane(&self) -> &P {
        &self.plane
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub async fn deploy(
        &self,
        target: &DeployTarget<P::Resource>,
        scope: &CancelScope,
    ) -> Result<Deployed<P::Resource>, DeployError> {
        let action = self.lookup(&target.name, scope).await?;
        self.submit(target, action, scope).await
    }

    /// Decide between create and update. Only `NotFound` counts as absent.
    pub async fn lookup(&self, name: &str, scope: &CancelScope) -> Result<DeployAction, DeployError> {
        scope.check().map_err(|e| DeployError::wait(name, e))?;

        match self.plane.get_resource(name).await {
            Ok(_) => Ok(DeployAction::Updated),
            Err(e) if e.is_not_found() => Ok(DeployAction::Created),
            Err(e) => Err(DeployError::Lookup {
                name: name.to_owned(),
                source: e,
            }),
        }
    }

    /// Submit `action` for `target` and poll it to a terminal state.
    pub async fn submit(
        &self,
        target: &DeployTarget<P::Resource>,
        action: DeployAction,
        scope: &CancelScope,
    ) -> Result<Deployed<P::Resource>, DeployError> {
        let name = target.name.as_str();
        tracing::info!(resource = name, %action, "submitting");

        let submitted = match action {
            DeployAction::Created => {
                self.plane
                    .create_resource(&target.parent, &target.id, &target.resource)
                    .await
            }
            DeployAction::Updated => self.plane.update_resource(name, &target.resource).await,
        }
        .map_err(|e| DeployError::Submit {
            name: name.to_owned(),
            action,
            source: e,
        })?;
        tracing::info!(resource = name, operation = submitted.name(), "waiting for operation");

        let payload = self
            .poller
            .wait(&self.plane, submitted, scope)
            .await
            .map_err(|e| DeployError::wait(name, e))?;

        let resource = if payload.is_null() {
            // Some operations finish without echoing the resource.
            self.plane
                .get_resource(name)
                .await
                .map_err(|e| DeployError::Refresh {
                    name: name.to_owned(),
                    source: e,
                })?
        } else {
            serde_json::from_value(payload).map_err(|e| DeployError::Decode {
                name: name.to_owned(),
                source: e,
            })?
        };

        tracing::info!(resource = name, %action, "operation finished");
        Ok(Deployed { action, resource })
    }
}

impl<P: ControlPlane + TrafficControl> Orchestrator<P> {
    /// Route all of `service`'s traffic to `version` and wait for the split to apply.
    pub async fn promote(
        &self,
        service: &str,
        version: &str,
        scope: &CancelScope,
    ) -> Result<(), PromoteError> {
        let allocations = BTreeMap::from([(version.to_owned(), 1.0)]);
        tracing::info!(service, version, "promoting version");

        let submitted = self
            .plane
            .update_traffic_split(service, &allocations)
            .await
            .map_err(|e| PromoteError::Submit {
                service: service.to_owned(),
                version: version.to_owned(),
                source: e,
            })?;

        self.poller
            .wait(&self.plane, submitted, scope)
            .await
            .map_err(|e| PromoteError::Wait {
                service: service.to_owned(),
                version: version.to_owned(),
                source: e,
            })?;

        tracing::info!(service, version, "version is serving all traffic");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to look up {name}")]
    Lookup { name: String, source: ApiError },

    #[error("failed to submit {action} of {name}")]
    Submit {
        name: String,
        action: DeployAction,
        source: ApiError,
    },

    #[error("deploy of {name} did not complete")]
    Wait { name: String, source: WaitError },

    #[error("failed to fetch {name} after deploy")]
    Refresh { name: String, source: ApiError },

    #[error("unexpected resource payload for {name}")]
    Decode {
        name: String,
        source: serde_json::Error,
    },
}

impl DeployError {
    fn wait(name: &str, source: WaitError) -> Self {
        Self::Wait {
            name: name.to_owned(),
            source,
        }
    }

    /// True when the deploy stopped because we gave up waiting.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Wait { source, .. } if source.is_cancellation())
    }

    /// Status reported by the control plane for a failed operation.
    pub fn remote_status(&self) -> Option<&OperationStatus> {
        match self {
            Self::Wait { source, .. } => source.remote_status(),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PromoteError {
    #[error("failed to submit traffic split for {service} → {version}")]
    Submit {
        service: String,
        version: String,
        source: ApiError,
    },

    #[error("traffic split for {service} → {version} did not complete")]
    Wait {
        service: String,
        version: String,
        source: WaitError,
    },
}

impl PromoteError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Wait { source, .. } if source.is_cancellation())
    }

    pub fn remote_status(&self) -> Option<&OperationStatus> {
        match self {
            Self::Wait { source, .. } => source.remote_status(),
            Self::Submit { .. } => None,
        }
    }
}
