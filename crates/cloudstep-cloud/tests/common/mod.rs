//! In-memory control plane and stager that record every call.

#![allow(dead_code)]

pub mod server;

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use cloudstep_cloud::{
    ApiError, ControlPlane, Operation, OperationSource, Stager, StagingError, StagingReference,
    TrafficControl,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetResource(String),
    Create {
        parent: String,
        id: String,
        body: Value,
    },
    Update {
        name: String,
        body: Value,
    },
    GetOperation(String),
    TrafficSplit {
        service: String,
        allocations: BTreeMap<String, f64>,
    },
}

pub struct FakePlane<R> {
    existing: Mutex<Option<R>>,
    lookup_error: Mutex<Option<ApiError>>,
    submit: Mutex<Option<Operation>>,
    traffic: Mutex<Option<Operation>>,
    polls: Mutex<VecDeque<Result<Operation, ApiError>>>,
    calls: Mutex<Vec<Call>>,
}

impl<R> FakePlane<R> {
    /// Plane with no existing resource whose submits return a pending operation.
    pub fn new() -> Self {
        Self {
            existing: Mutex::new(None),
            lookup_error: Mutex::new(None),
            submit: Mutex::new(None),
            traffic: Mutex::new(None),
            polls: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_existing(self, resource: R) -> Self {
        *self.existing.lock().unwrap() = Some(resource);
        self
    }

    /// The next lookup fails with `error` instead of consulting `existing`.
    pub fn with_lookup_error(self, error: ApiError) -> Self {
        *self.lookup_error.lock().unwrap() = Some(error);
        self
    }

    /// Operation returned by create/update. Defaults to `pending("operations/deploy")`.
    pub fn with_submit(self, operation: Operation) -> Self {
        *self.submit.lock().unwrap() = Some(operation);
        self
    }

    /// Operation returned by traffic split updates. Defaults to `pending("operations/split")`.
    pub fn with_traffic(self, operation: Operation) -> Self {
        *self.traffic.lock().unwrap() = Some(operation);
        self
    }

    /// Successive `get_operation` results. Once exhausted, operations stay pending.
    pub fn with_polls<I>(self, polls: I) -> Self
    where
        I: IntoIterator<Item = Result<Operation, ApiError>>,
    {
        self.polls.lock().unwrap().extend(polls);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operation_polls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::GetOperation(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl<R: Send + Sync> OperationSource for FakePlane<R> {
    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        self.record(Call::GetOperation(name.to_owned()));
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Operation::pending(name)))
    }
}

impl<R> ControlPlane for FakePlane<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    type Resource = R;

    async fn get_resource(&self, name: &str) -> Result<R, ApiError> {
        self.record(Call::GetResource(name.to_owned()));
        if let Some(error) = self.lookup_error.lock().unwrap().take() {
            return Err(error);
        }
        self.existing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::NotFound {
                url: name.to_owned(),
            })
    }

    async fn create_resource(
        &self,
        parent: &str,
        id: &str,
        resource: &R,
    ) -> Result<Operation, ApiError> {
        self.record(Call::Create {
            parent: parent.to_owned(),
            id: id.to_owned(),
            body: serde_json::to_value(resource).unwrap(),
        });
        *self.existing.lock().unwrap() = Some(resource.clone());
        Ok(self
            .submit
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Operation::pending("operations/deploy")))
    }

    async fn update_resource(&self, name: &str, resource: &R) -> Result<Operation, ApiError> {
        self.record(Call::Update {
            name: name.to_owned(),
            body: serde_json::to_value(resource).unwrap(),
        });
        *self.existing.lock().unwrap() = Some(resource.clone());
        Ok(self
            .submit
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Operation::pending("operations/deploy")))
    }
}

impl<R: Send + Sync> TrafficControl for FakePlane<R> {
    async fn update_traffic_split(
        &self,
        service: &str,
        allocations: &BTreeMap<String, f64>,
    ) -> Result<Operation, ApiError> {
        self.record(Call::TrafficSplit {
            service: service.to_owned(),
            allocations: allocations.clone(),
        });
        Ok(self
            .traffic
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Operation::pending("operations/split")))
    }
}

/// Stager that checks the archive exists and pretends to upload it.
pub struct FakeStager {
    staged: Mutex<Vec<(PathBuf, u64)>>,
}

impl FakeStager {
    pub fn new() -> Self {
        Self {
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Archive paths and sizes seen by `stage`.
    pub fn staged(&self) -> Vec<(PathBuf, u64)> {
        self.staged.lock().unwrap().clone()
    }
}

impl Stager for FakeStager {
    async fn stage(&self, archive: &Path) -> Result<StagingReference, StagingError> {
        let len = std::fs::metadata(archive)
            .map_err(|e| StagingError::ReadArchive {
                path: archive.to_path_buf(),
                source: e,
            })?
            .len();
        self.staged
            .lock()
            .unwrap()
            .push((archive.to_path_buf(), len));
        Ok(StagingReference::Object {
            bucket: "staging.p.appspot.com".to_owned(),
            object: "cloudstep/source.zip".to_owned(),
        })
    }
}

/// Source directory with a couple of files.
pub fn source_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
    std::fs::create_dir(dir.path().join("static")).unwrap();
    std::fs::write(dir.path().join("static/index.html"), "<html></html>\n").unwrap();
    dir
}
