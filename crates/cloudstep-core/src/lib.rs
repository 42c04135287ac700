//! Core types and configuration for cloudstep.
//!
//! This crate defines the `cloudstep.toml` schema ([`StepConfig`]), the
//! `app.yaml` manifest ([`AppManifest`]), the validated [`DeployRequest`],
//! provenance records, and shared error types. Nothing here touches the
//! network.

pub mod config;
pub mod error;
pub mod manifest;
pub mod provenance;
pub mod request;
pub mod version;

pub use config::{DeployConfig, EndpointConfig, ProjectConfig, StepConfig};
pub use error::{Error, Result};
pub use manifest::AppManifest;
pub use provenance::Provenance;
pub use request::{DeployRequest, DeployRequestBuilder, DeploySource};
pub use version::{current_version_id, generate_version_id};
