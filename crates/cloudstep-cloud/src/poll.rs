//! Fixed-interval polling of long-running operations.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::operation::{Operation, OperationResult, OperationStatus};
use crate::plane::OperationSource;
use crate::rest::ApiError;

/// Cancellation and optional deadline for everything a deploy waits on.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the scope is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), WaitError> {
        if self.token.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(WaitError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn expired(&self) -> WaitError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => WaitError::Cancelled,
                () = tokio::time::sleep_until(deadline) => WaitError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                WaitError::Cancelled
            }
        }
    }
}

/// Polls an operation at a fixed interval until it is done.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl Poller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for `operation` to finish and return its success payload.
    ///
    /// Already-done operations resolve without any call. Otherwise the
    /// operation is re-fetched every interval until the first fetch that
    /// reports it done. Both the interval sleep and each in-flight fetch are
    /// abandoned as soon as the scope expires.
    pub async fn wait<S: OperationSource>(
        &self,
        source: &S,
        operation: Operation,
        scope: &CancelScope,
    ) -> Result<Value, WaitError> {
        let mut operation = operation;
        let mut polls: u32 = 0;

        loop {
            match operation.into_parts() {
                (_, OperationResult::Success(payload)) => {
                    tracing::debug!(polls, "operation succeeded");
                    return Ok(payload);
                }
                (name, OperationResult::Failure(status)) => {
                    return Err(WaitError::Failed {
                        operation: name,
                        status,
                    });
                }
                (name, OperationResult::Pending) => {
                    scope.check()?;
                    tokio::select! {
                        biased;
                        err = scope.expired() => return Err(err),
                        () = tokio::time::sleep(self.interval) => {}
                    }
                    scope.check()?;

                    operation = tokio::select! {
                        biased;
                        err = scope.expired() => return Err(err),
                        fetched = source.get_operation(&name) => fetched.map_err(|e| WaitError::Fetch {
                            operation: name.clone(),
                            source: e,
                        })?,
                    };
                    polls += 1;
                    tracing::debug!(operation = %name, polls, done = operation.is_done(), "polled operation");
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("cancelled while waiting for operation")]
    Cancelled,

    #[error("deadline exceeded while waiting for operation")]
    DeadlineExceeded,

    #[error("failed to fetch operation {operation}")]
    Fetch { operation: String, source: ApiError },

    #[error("operation {operation} failed with {status}")]
    Failed {
        operation: String,
        status: OperationStatus,
    },
}

impl WaitError {
    /// True when we stopped waiting, as opposed to the remote side failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    pub fn remote_status(&self) -> Option<&OperationStatus> {
        match self {
            Self::Failed { status, .. } => Some(status),
            _ => None,
        }
    }
}
