//! Execution requests and artifact names

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::GatewayError;

/// Longest name most filesystems accept for a single path component
const MAX_NAME_BYTES: usize = 255;

/// Device names Windows refuses as file names, with or without extension
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "LPT1",
    "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// A validated artifact name, safe to use as a single path component
///
/// Construction rejects anything that could resolve outside the storage
/// root: separators, traversal components, NUL bytes and reserved device
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Validate and wrap a caller-supplied name
    pub fn new(name: impl Into<String>) -> Result<Self, GatewayError> {
        let name = name.into();
        debug!(%name, "ArtifactName::new: called");

        if let Some(reason) = Self::rejection(&name) {
            debug!(%name, reason, "ArtifactName::new: rejected");
            return Err(GatewayError::InvalidName { name, reason });
        }

        Ok(Self(name))
    }

    fn rejection(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return Some("name is empty");
        }
        if name.len() > MAX_NAME_BYTES {
            return Some("name is longer than 255 bytes");
        }
        if name.contains('/') || name.contains('\\') {
            return Some("contains a path separator");
        }
        if name.contains('\0') {
            return Some("contains a NUL byte");
        }
        if name.chars().all(|c| c == '.') {
            return Some("is a traversal component");
        }
        if name.chars().any(char::is_control) {
            return Some("contains a control character");
        }

        let stem = name.split('.').next().unwrap_or(name).trim_end();
        if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
            return Some("is a reserved device name");
        }

        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactName> for String {
    fn from(name: ArtifactName) -> Self {
        name.0
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of work submitted to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionRequest {
    /// Persist `body` as an artifact, then run it through the interpreter
    SourcePayload { name: ArtifactName, body: String },

    /// Run `text` through the shell inside the configured environment
    CommandLine { text: String },
}

impl ExecutionRequest {
    /// Build a source payload request, validating the name
    pub fn source(name: impl Into<String>, body: impl Into<String>) -> Result<Self, GatewayError> {
        Ok(Self::SourcePayload {
            name: ArtifactName::new(name)?,
            body: body.into(),
        })
    }

    /// Build a command line request
    pub fn command(text: impl Into<String>) -> Self {
        Self::CommandLine { text: text.into() }
    }

    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourcePayload { .. } => "source_payload",
            Self::CommandLine { .. } => "command_line",
        }
    }
}
