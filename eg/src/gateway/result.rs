//! Execution results

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// How a single execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Child exited with code 0
    Success,
    /// Child exited with a nonzero code
    Failure,
    /// Validation, persistence or spawn failed; no exit code
    InternalError,
    /// Child was killed after the timeout elapsed
    Timeout,
    /// Child was killed because the caller cancelled
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::InternalError => "internal_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of one submitted request
///
/// `exit_code` is `Some` only when the child was spawned and exited on its
/// own. `artifact_path` is set for source payloads once the path is known,
/// whatever happened afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Result for a fault that happened before or instead of a clean run
    pub fn internal_error(message: impl Into<String>, artifact_path: Option<PathBuf>) -> Self {
        debug!("ExecutionResult::internal_error: called");
        Self {
            status: ExecutionStatus::InternalError,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: None,
            artifact_path,
            duration_ms: 0,
        }
    }

    /// Result for a request whose token fired before anything ran
    pub fn cancelled() -> Self {
        debug!("ExecutionResult::cancelled: called");
        Self {
            status: ExecutionStatus::Cancelled,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            artifact_path: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
