//! Gateway error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while turning a request into a child process
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid artifact name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Failed to write artifact {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with code {exit_code}: {stderr}")]
    CommandExecution { exit_code: i32, stderr: String },

    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Command was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
