//! execute_command tool - run a shell command inside the configured environment

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::gateway::GatewayError;
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

/// Execute a shell command in the activated runtime environment
pub struct ExecuteCommandTool;

#[derive(Debug, Deserialize)]
struct ExecuteCommandArgs {
    command: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &'static str {
        "execute_command"
    }

    fn description(&self) -> &'static str {
        "Execute a command in the configured runtime environment and return its output."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command to be executed"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default: configured gateway timeout)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ExecuteCommandTool::execute: called");
        if input.get("command").is_none() {
            debug!("ExecuteCommandTool::execute: missing command parameter");
            return ToolResult::error(ToolError::MissingParameter { name: "command" }.to_string());
        }
        let args: ExecuteCommandArgs = match serde_json::from_value(input) {
            Ok(args) => args,
            Err(e) => {
                debug!(%e, "ExecuteCommandTool::execute: invalid arguments");
                return ToolResult::error(ToolError::invalid(e).to_string());
            }
        };

        let options = ctx.submit_options(args.timeout_ms);
        match ctx.gateway.run_command(&args.command, &options).await {
            Ok(stdout) => {
                debug!(stdout_len = %stdout.len(), "ExecuteCommandTool::execute: command succeeded");
                ToolResult::success(stdout)
            }
            Err(GatewayError::CommandExecution { stderr, .. }) => {
                debug!("ExecuteCommandTool::execute: command failed");
                ToolResult::error(format!("Error: {}", stderr))
            }
            Err(e) => {
                debug!(%e, "ExecuteCommandTool::execute: command did not complete");
                ToolResult::error(format!("Error: {}", e))
            }
        }
    }
}
