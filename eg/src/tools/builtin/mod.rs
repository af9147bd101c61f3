//! Built-in execution tools

mod execute_code;
mod execute_command;

pub use execute_code::ExecuteCodeTool;
pub use execute_command::ExecuteCommandTool;
