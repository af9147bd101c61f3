//! execgate - execution gateway for agent tools
//!
//! Runs caller-submitted work as child processes on behalf of an agent and
//! hands back a structured result.
//!
//! # Core Concepts
//!
//! - **One request, one child**: every submission spawns exactly one process
//! - **Artifacts on disk**: code is written under the storage root before it
//!   runs, and stays there afterwards for inspection
//! - **Status, not exceptions**: `submit` reports failures, timeouts and
//!   cancellations as statuses
//! - **Arguments, not interpolation**: environment activation receives
//!   paths and command text as positional parameters
//!
//! # Modules
//!
//! - [`gateway`] - Execution gateway, artifact store, environments
//! - [`tools`] - Agent tool bindings over the gateway
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod gateway;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use gateway::{
    ArtifactName, ArtifactStore, COMPLETION_SUFFIX, Environment, ExecutionGateway, ExecutionRequest,
    ExecutionResult, ExecutionStatus, GatewayConfig, GatewayError, SubmitOptions,
};
pub use tools::{Tool, ToolCall, ToolContext, ToolDefinition, ToolError, ToolExecutor, ToolResult};
