//! Deploy orchestration against Google control planes.
//!
//! The building blocks, bottom up:
//! - [`AccessToken`] and [`RestClient`]: bearer-authenticated JSON transport
//! - [`Operation`] and [`Poller`]: long-running operation handles and polling
//! - [`ControlPlane`], [`TrafficControl`]: capability traits the
//!   [`Orchestrator`] drives, implemented by [`AppEngineApi`] and [`FunctionsApi`]
//! - [`Stager`]: archive uploads to a bucket or a signed URL
//! - [`AppEngineDeploy`], [`FunctionDeploy`]: the full pipelines

pub mod appengine;
pub mod auth;
pub mod executor;
pub mod functions;
pub mod operation;
pub mod orchestrator;
pub mod pipeline;
pub mod plane;
pub mod poll;
pub mod rest;
pub mod storage;

pub use appengine::{AppEngineApi, Version};
pub use auth::{AccessToken, AuthError};
pub use executor::{GcloudError, GcloudExecutor, RealExecutor};
pub use functions::{Function, FunctionsApi};
pub use operation::{Operation, OperationResult, OperationStatus};
pub use orchestrator::{
    DeployAction, DeployError, DeployTarget, Deployed, Orchestrator, PromoteError,
};
pub use pipeline::{
    AppEngineDeploy, DeployOutcome, FunctionDeploy, PipelineError, StagedArchive,
    appengine_request,
};
pub use plane::{ControlPlane, OperationSource, TrafficControl};
pub use poll::{CancelScope, Poller, WaitError};
pub use rest::{ApiError, RestClient};
pub use storage::{
    BucketStager, SignedUpload, SignedUrlStager, SourceError, Stager, StagingError,
    StagingReference, UploadUrlIssuer, upload_to_signed_url,
};
