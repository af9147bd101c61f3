//! execgate - execution gateway CLI
//!
//! Entry point for running code and commands through the gateway from a
//! terminal, and for inspecting the tools it exposes to agents.

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use execgate::cli::{Cli, Command, OutputFormat};
use execgate::config::Config;
use execgate::gateway::{ExecutionGateway, ExecutionResult, SubmitOptions};
use execgate::tools::{ToolCall, ToolContext, ToolExecutor, ToolResult};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("execgate")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            other => eyre::bail!("Unknown log level: {}", other),
        },
        None => tracing::Level::INFO,
    };

    // Write to log file, not stdout/stderr
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("execgate.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration: file, then .env, then environment variables
    let config = Config::load_with_env(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!(
        "execgate loaded config: storage={}, interpreter={}",
        config.storage_path.display(),
        config.interpreter.program
    );

    let gateway = Arc::new(ExecutionGateway::new(config.gateway_config()).context("Failed to create gateway")?);

    let mut options = SubmitOptions::default();
    if let Some(ms) = cli.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    let code = match cli.command {
        Command::Code { name, file, body } => {
            let body = read_body(file, body)?;
            let result = gateway.execute_code(&name, &body, &options).await;
            print_result(&result, &cli.format)?
        }
        Command::Command { text } => {
            let text = text.join(" ");
            let result = gateway.submit(&execgate::ExecutionRequest::command(text), &options).await;
            print_result(&result, &cli.format)?
        }
        Command::Tools => {
            let defs = ToolExecutor::standard().definitions();
            println!("{}", serde_json::to_string_pretty(&defs)?);
            0
        }
        Command::Call { tool, input } => {
            let input: serde_json::Value = serde_json::from_str(&input).context("Tool input must be JSON")?;
            let call = ToolCall {
                id: "cli".to_string(),
                name: tool,
                input,
            };
            let ctx = ToolContext::new(Arc::clone(&gateway));
            let result = ToolExecutor::standard().execute(&call, &ctx).await;
            print_tool_result(&result, &cli.format)?
        }
        Command::Artifacts => {
            for name in gateway.store().list()? {
                println!("{}", name);
            }
            0
        }
    };

    debug!(%code, "main: exiting");
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Code from --file, --body, or stdin
fn read_body(file: Option<PathBuf>, body: Option<String>) -> Result<String> {
    match (file, body) {
        (Some(path), _) => fs::read_to_string(&path).context(format!("Failed to read {}", path.display())),
        (None, Some(body)) => Ok(body),
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read code from stdin")?;
            Ok(buf)
        }
    }
}

/// Print an execution result and return the process exit code to use
fn print_result(result: &ExecutionResult, format: &OutputFormat) -> Result<i32> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            let status = result.status.to_string();
            let label = if result.is_success() { status.green() } else { status.red() };
            eprintln!("{} {}", "status:".dimmed(), label);
            if let Some(path) = &result.artifact_path {
                eprintln!("{} {}", "artifact:".dimmed(), path.display());
            }
        }
    }

    Ok(match result.exit_code {
        Some(code) => code,
        None if result.is_success() => 0,
        None => 1,
    })
}

fn print_tool_result(result: &ToolResult, format: &OutputFormat) -> Result<i32> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => println!("{}", result.content),
    }
    Ok(if result.is_error { 1 } else { 0 })
}
