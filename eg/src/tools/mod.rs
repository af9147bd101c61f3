//! Tool system exposing the gateway to agents
//!
//! Tools wrap the execution gateway in the call shape agent frameworks use:
//! a name, a JSON Schema for input, and a text result flagged as error or
//! success. Every tool call runs through the `ExecutionGateway` held by its
//! `ToolContext`.

mod context;
mod error;
mod executor;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use traits::{Tool, ToolCall, ToolDefinition, ToolResult};
