//! execute_code tool - persist a code file and run it

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::gateway::{ExecutionResult, ExecutionStatus};
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

/// Write code under the storage root and execute it with the interpreter
pub struct ExecuteCodeTool;

#[derive(Debug, Deserialize)]
struct ExecuteCodeArgs {
    input_code: String,
    codefile_name: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

impl ExecuteCodeTool {
    /// Render a result in the shape agents already parse
    fn render(result: &ExecutionResult) -> Value {
        let file_path = result
            .artifact_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        match result.status {
            ExecutionStatus::Success => json!({
                "result": "Code executed successfully",
                "output": result.stdout,
                "file_path": file_path,
            }),
            ExecutionStatus::Failure => json!({
                "result": "Failed to execute",
                "error": result.stderr,
                "output": result.stdout,
                "exit_code": result.exit_code,
                "file_path": file_path,
            }),
            ExecutionStatus::InternalError => json!({
                "result": "Error occurred",
                "error": result.stderr,
                "file_path": file_path,
            }),
            ExecutionStatus::Timeout => json!({
                "result": "Timed out",
                "output": result.stdout,
                "error": result.stderr,
                "file_path": file_path,
            }),
            ExecutionStatus::Cancelled => json!({
                "result": "Cancelled",
                "output": result.stdout,
                "error": result.stderr,
                "file_path": file_path,
            }),
        }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &'static str {
        "execute_code"
    }

    fn description(&self) -> &'static str {
        "Execute code and return the result. The code is written to the named file in the \
         storage directory, run with the configured interpreter, and its output or error returned."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_code": {
                    "type": "string",
                    "description": "The code to execute"
                },
                "codefile_name": {
                    "type": "string",
                    "description": "The code file name, without directories"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default: configured gateway timeout)"
                }
            },
            "required": ["input_code", "codefile_name"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ExecuteCodeTool::execute: called");
        let args: ExecuteCodeArgs = match serde_json::from_value(input) {
            Ok(args) => args,
            Err(e) => {
                debug!(%e, "ExecuteCodeTool::execute: invalid arguments");
                return ToolResult::error(ToolError::invalid(e).to_string());
            }
        };

        let options = ctx.submit_options(args.timeout_ms);
        let result = ctx
            .gateway
            .execute_code(&args.codefile_name, &args.input_code, &options)
            .await;
        debug!(status = %result.status, "ExecuteCodeTool::execute: finished");

        let content = Self::render(&result).to_string();
        if result.is_success() {
            ToolResult::success(content)
        } else {
            ToolResult::error(content)
        }
    }
}
