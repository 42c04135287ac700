//! End-to-end deploy flows.
//!
//! ```text
//! App Engine
//!   validate ─▶ lookup ─┬─absent─▶ archive ─▶ digest ─▶ stage ─▶ create + poll ─▶ promote (optional)
//!                       └─exists─▶ patch serving status + poll
//! Cloud Functions
//!   validate ─▶ archive ─▶ digest ─▶ stage ─▶ lookup ─▶ create-or-update + poll
//! ```
//!
//! Archiving only happens for a local source directory.
//!
//! Validation runs before anything touches the network or the filesystem
//! beyond the source directory check. The temporary archive lives until the
//! pipeline returns, on every path.

use cloudstep_build::{ArchiveError, ArchiveSummary, DigestError};
use cloudstep_core::{AppManifest, DeployRequest, DeployRequestBuilder, DeploySource};

use crate::appengine::{self, Version};
use crate::functions::{self, Function};
use crate::operation::OperationStatus;
use crate::orchestrator::{DeployAction, DeployError, DeployTarget, Orchestrator, PromoteError};
use crate::plane::{ControlPlane, TrafficControl};
use crate::poll::{CancelScope, Poller};
use crate::storage::{SourceError, Stager, StagingError, StagingReference};

/// Archive that was built locally and uploaded for this deploy.
#[derive(Debug, Clone)]
pub struct StagedArchive {
    pub reference: StagingReference,
    /// `sha256:<hex>` of the uploaded bytes
    pub digest: String,
    pub summary: ArchiveSummary,
}

#[derive(Debug)]
pub struct DeployOutcome<R> {
    /// Full resource name that was deployed
    pub name: String,
    pub action: DeployAction,
    /// Final resource snapshot
    pub resource: R,
    pub staged: Option<StagedArchive>,
    /// `None` unless a newly created version was to be promoted
    pub promotion: Option<Result<(), PromoteError>>,
}

impl<R> DeployOutcome<R> {
    pub fn promoted(&self) -> bool {
        matches!(self.promotion, Some(Ok(())))
    }

    /// Turn a failed promotion into [`PipelineError::Promote`].
    pub fn require_promotion(self) -> Result<Self, PipelineError> {
        match self.promotion {
            Some(Err(source)) => Err(PipelineError::Promote {
                name: self.name,
                source,
            }),
            promotion => Ok(Self { promotion, ..self }),
        }
    }
}

// ── App Engine ──

pub struct AppEngineDeploy<P, S> {
    orchestrator: Orchestrator<P>,
    stager: S,
}

impl<P, S> AppEngineDeploy<P, S>
where
    P: ControlPlane<Resource = Version> + TrafficControl,
    S: Stager,
{
    pub fn new(plane: P, stager: S, poller: Poller) -> Self {
        Self {
            orchestrator: Orchestrator::with_poller(plane, poller),
            stager,
        }
    }

    /// Validate `manifest` and `builder`, then deploy.
    pub async fn run(
        &self,
        manifest: &AppManifest,
        builder: DeployRequestBuilder,
        scope: &CancelScope,
    ) -> Result<DeployOutcome<Version>, PipelineError> {
        let request = appengine_request(manifest, builder)?;
        self.deploy(&request, manifest, scope).await
    }

    /// Deploy an already validated request. The request must carry a version id.
    ///
    /// A new version is staged, created and, when requested, promoted. An
    /// existing version keeps its source: only its serving status is patched,
    /// nothing is uploaded and traffic is left alone.
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        manifest: &AppManifest,
        scope: &CancelScope,
    ) -> Result<DeployOutcome<Version>, PipelineError> {
        let version_id = request
            .version_id()
            .ok_or(PipelineError::Invalid {
                source: cloudstep_core::Error::MissingField { field: "version" },
            })?
            .to_owned();
        let project = request.project_id();
        let service = request.resource_name();
        let parent = appengine::service_name(project, service);
        let name = appengine::version_name(project, service, &version_id);

        let action = self
            .orchestrator
            .lookup(&name, scope)
            .await
            .map_err(|e| PipelineError::Deploy { source: e })?;

        // Nothing is staged for an existing version: its source cannot change.
        let (staged, _archive, resource) = match action {
            DeployAction::Created => {
                let (staged, archive) = stage_source(&self.stager, request).await?;
                let resource = appengine::build_version(
                    request,
                    manifest,
                    staged.as_ref().map(|s| &s.reference),
                )
                .map_err(|e| PipelineError::Source { source: e })?;
                (staged, archive, resource)
            }
            DeployAction::Updated => {
                tracing::warn!(
                    version = %name,
                    "version already exists, keeping its source and updating the serving status only"
                );
                (None, None, appengine::serving_update(&version_id))
            }
        };

        let target = DeployTarget {
            parent,
            id: version_id.clone(),
            name,
            resource,
        };
        let deployed = self
            .orchestrator
            .submit(&target, action, scope)
            .await
            .map_err(|e| PipelineError::Deploy { source: e })?;

        let promotion = match (action, request.promote()) {
            (DeployAction::Created, true) => Some(
                self.orchestrator
                    .promote(&target.parent, &version_id, scope)
                    .await,
            ),
            (DeployAction::Created, false) => {
                tracing::info!(service, version = %version_id, "skipping promotion");
                None
            }
            (DeployAction::Updated, _) => None,
        };

        Ok(DeployOutcome {
            name: target.name,
            action: deployed.action,
            resource: deployed.resource,
            staged,
            promotion,
        })
    }
}

/// Merge manifest settings into `builder` and validate the result.
///
/// The manifest supplies runtime, service, entrypoint and environment
/// variables. A version id is generated from the current time when none was
/// given.
pub fn appengine_request(
    manifest: &AppManifest,
    builder: DeployRequestBuilder,
) -> Result<DeployRequest, PipelineError> {
    manifest.validate_flex().map_err(PipelineError::invalid)?;

    let mut builder = builder
        .resource_name(manifest.service_name())
        .env_variables(&manifest.env_variables);
    if let Some(runtime) = manifest.runtime() {
        builder = builder.runtime(runtime);
    }

    let request = builder.build().map_err(PipelineError::invalid)?;
    if request.version_id().is_some() {
        return Ok(request);
    }

    let version = cloudstep_core::current_version_id();
    tracing::info!(%version, "generated version id");
    Ok(request.with_version_id(version))
}

// ── Cloud Functions ──

pub struct FunctionDeploy<P, S> {
    orchestrator: Orchestrator<P>,
    stager: S,
}

impl<P, S> FunctionDeploy<P, S>
where
    P: ControlPlane<Resource = Function>,
    S: Stager,
{
    pub fn new(plane: P, stager: S, poller: Poller) -> Self {
        Self {
            orchestrator: Orchestrator::with_poller(plane, poller),
            stager,
        }
    }

    pub async fn run(
        &self,
        builder: DeployRequestBuilder,
        scope: &CancelScope,
    ) -> Result<DeployOutcome<Function>, PipelineError> {
        let request = builder.build().map_err(PipelineError::invalid)?;
        self.deploy(&request, scope).await
    }

    pub async fn deploy(
        &self,
        request: &DeployRequest,
        scope: &CancelScope,
    ) -> Result<DeployOutcome<Function>, PipelineError> {
        if matches!(request.source(), DeploySource::ContainerImage(_)) {
            return Err(PipelineError::Source {
                source: SourceError::Unsupported {
                    platform: "Cloud Functions",
                },
            });
        }

        let (staged, _archive) = stage_source(&self.stager, request).await?;
        let resource = functions::build_function(request, staged.as_ref().map(|s| &s.reference))
            .map_err(|e| PipelineError::Source { source: e })?;

        let project = request.project_id();
        let region = request.region();
        let id = request.resource_name();
        let target = DeployTarget {
            parent: functions::location_name(project, region),
            id: id.to_owned(),
            name: functions::function_name(project, region, id),
            resource,
        };
        let deployed = self
            .orchestrator
            .deploy(&target, scope)
            .await
            .map_err(|e| PipelineError::Deploy { source: e })?;

        Ok(DeployOutcome {
            name: target.name,
            action: deployed.action,
            resource: deployed.resource,
            staged,
            promotion: None,
        })
    }
}

/// Archive, digest and upload a source directory. Other sources pass through.
///
/// The returned [`cloudstep_build::TempArchive`] must outlive the deploy so
/// the caller controls when the local file goes away.
async fn stage_source<S: Stager>(
    stager: &S,
    request: &DeployRequest,
) -> Result<(Option<StagedArchive>, Option<cloudstep_build::TempArchive>), PipelineError> {
    let DeploySource::Directory(dir) = request.source() else {
        return Ok((None, None));
    };

    let archive =
        cloudstep_build::archive_to_temp(dir).map_err(|e| PipelineError::Archive { source: e })?;
    let digest = cloudstep_build::sha256_file(archive.path())
        .map_err(|e| PipelineError::Digest { source: e })?;
    tracing::info!(
        source = %dir.display(),
        files = archive.summary().files,
        %digest,
        "archived source"
    );

    let reference = stager
        .stage(archive.path())
        .await
        .map_err(|e| PipelineError::Staging { source: e })?;

    let staged = StagedArchive {
        reference,
        digest,
        summary: archive.summary(),
    };
    Ok((Some(staged), Some(archive)))
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid deploy request")]
    Invalid { source: cloudstep_core::Error },

    #[error("unusable deploy source")]
    Source { source: SourceError },

    #[error("failed to archive source")]
    Archive { source: ArchiveError },

    #[error("failed to digest archive")]
    Digest { source: DigestError },

    #[error("failed to stage archive")]
    Staging { source: StagingError },

    #[error("deploy failed")]
    Deploy { source: DeployError },

    #[error("{name} was deployed but not promoted")]
    Promote { name: String, source: PromoteError },
}

impl PipelineError {
    fn invalid(source: cloudstep_core::Error) -> Self {
        Self::Invalid { source }
    }

    /// Rejected before any network call.
    ///
    /// Other [`SourceError`]s surface after staging and do not count.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Invalid { .. }
                | Self::Source {
                    source: SourceError::Unsupported { .. }
                }
        )
    }

    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Deploy { source } => source.is_cancellation(),
            Self::Promote { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    pub fn remote_status(&self) -> Option<&OperationStatus> {
        match self {
            Self::Deploy { source } => source.remote_status(),
            Self::Promote { source, .. } => source.remote_status(),
            _ => None,
        }
    }
}
