//! Long-running operation handles returned by Google control planes.
//!
//! The wire shape is `{name, done, error?, response?}`. [`Operation`] folds
//! `done` into its result so a finished operation can never be pending and an
//! unfinished one can never carry a result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote status of a failed operation (`google.rpc.Status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Value>,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)?;
        if !self.details.is_empty() {
            write!(f, " (details: {})", Value::Array(self.details.clone()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Pending,
    Success(Value),
    Failure(OperationStatus),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireOperation")]
pub struct Operation {
    name: String,
    result: OperationResult,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: OperationResult::Pending,
        }
    }

    pub fn succeeded(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            result: OperationResult::Success(payload),
        }
    }

    pub fn failed(name: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            name: name.into(),
            result: OperationResult::Failure(status),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.result, OperationResult::Pending)
    }

    pub fn result(&self) -> &OperationResult {
        &self.result
    }

    pub fn into_result(self) -> OperationResult {
        self.result
    }

    pub fn into_parts(self) -> (String, OperationResult) {
        (self.name, self.result)
    }
}

#[derive(Deserialize)]
struct WireOperation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationStatus>,
    #[serde(default)]
    response: Option<Value>,
}

impl From<WireOperation> for Operation {
    fn from(wire: WireOperation) -> Self {
        let result = match (wire.done, wire.error) {
            (false, _) => OperationResult::Pending,
            (true, Some(status)) => OperationResult::Failure(status),
            (true, None) => OperationResult::Success(wire.response.unwrap_or(Value::Null)),
        };
        Self {
            name: wire.name,
            result,
        }
    }
}
