//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// execgate - run agent code and commands as child processes
#[derive(Parser, Debug)]
#[command(
    name = "eg",
    about = "Execution gateway for agent code and command tools",
    version,
    after_help = "Logs are written to: ~/.local/share/execgate/logs/execgate.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Timeout in milliseconds for this invocation
    #[arg(short, long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Persist code under the storage root and run it
    Code {
        /// Artifact file name (no directories)
        name: String,

        /// Read the code from this file
        #[arg(long, conflicts_with = "body")]
        file: Option<PathBuf>,

        /// Use this text as the code; stdin is read when neither is given
        #[arg(long)]
        body: Option<String>,
    },

    /// Run a command inside the configured environment
    Command {
        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Print tool definitions as JSON
    Tools,

    /// Invoke a tool with JSON input
    Call {
        /// Tool name
        tool: String,

        /// JSON input object
        #[arg(default_value = "{}")]
        input: String,
    },

    /// List stored artifacts
    Artifacts,
}

/// Output format for results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_with_body() {
        let cli = Cli::try_parse_from(["eg", "code", "a.py", "--body", "print(1)"]).unwrap();
        match cli.command {
            Command::Code { name, body, file } => {
                assert_eq!(name, "a.py");
                assert_eq!(body.as_deref(), Some("print(1)"));
                assert!(file.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_command_keeps_hyphen_arguments() {
        let cli = Cli::try_parse_from(["eg", "--format", "json", "command", "ls", "-la"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Command { text } => assert_eq!(text, vec!["ls", "-la"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_file_conflicts_with_body() {
        let result = Cli::try_parse_from(["eg", "code", "a.py", "--body", "x", "--file", "y.py"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
