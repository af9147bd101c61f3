//! Tool error types

use thiserror::Error;

/// Errors raised while interpreting a tool call
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{name} is required")]
    MissingParameter { name: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
}

impl ToolError {
    pub(crate) fn invalid(e: serde_json::Error) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}
