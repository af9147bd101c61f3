//! execgate configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gateway::{COMPLETION_SUFFIX, Environment, GatewayConfig};

/// Environment variables that override file configuration
pub const STORAGE_PATH_VAR: &str = "STORAGE_PATH";
pub const CONDA_PATH_VAR: &str = "CONDA_PATH";
pub const CONDA_ENV_VAR: &str = "CONDA_ENV";
pub const INTERPRETER_VAR: &str = "EXECGATE_INTERPRETER";
pub const TIMEOUT_VAR: &str = "EXECGATE_TIMEOUT_MS";

/// Main execgate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory submitted code files are written to
    #[serde(rename = "storage-path")]
    pub storage_path: PathBuf,

    /// Interpreter for code files
    pub interpreter: InterpreterConfig,

    /// Shell used for commands
    pub shell: String,

    /// Runtime environment commands are activated in
    pub environment: Environment,

    /// Appended to the output of successful code runs
    #[serde(rename = "completion-suffix")]
    pub completion_suffix: String,

    /// Default timeout in milliseconds; unset waits forever
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Working directory for children; unset inherits ours
    #[serde(rename = "working-dir")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for children
    pub env: BTreeMap<String, String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./data_storage/"),
            interpreter: InterpreterConfig::default(),
            shell: "bash".to_string(),
            environment: Environment::None,
            completion_suffix: COMPLETION_SUFFIX.to_string(),
            timeout_ms: None,
            working_dir: None,
            env: BTreeMap::new(),
            log_level: None,
        }
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Interpreter program
    pub program: String,

    /// Arguments placed before the code file path
    pub args: Vec<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .execgate.yml
        let local_config = PathBuf::from(".execgate.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/execgate/execgate.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("execgate").join("execgate.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration, then `.env`, then process environment overrides
    pub fn load_with_env(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        // .env never overrides variables that are already set
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!("Loaded environment from: {}", path.display());
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Overlay variables from `lookup`, which win over file values
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(STORAGE_PATH_VAR) {
            self.storage_path = PathBuf::from(path);
        }

        if let Some(program) = lookup(INTERPRETER_VAR) {
            self.interpreter.program = program;
        }

        if let Some(ms) = lookup(TIMEOUT_VAR) {
            let ms = ms
                .trim()
                .parse::<u64>()
                .context(format!("{} must be a number of milliseconds", TIMEOUT_VAR))?;
            self.timeout_ms = Some(ms);
        }

        let conda_path = lookup(CONDA_PATH_VAR).map(PathBuf::from);
        if let Some(name) = lookup(CONDA_ENV_VAR) {
            let install_path = conda_path
                .or_else(|| self.conda_install_path())
                .unwrap_or_else(default_conda_path);
            self.environment = Environment::Conda { install_path, name };
        } else if let (Environment::Conda { install_path, .. }, Some(path)) = (&mut self.environment, conda_path) {
            *install_path = path;
        }

        Ok(())
    }

    fn conda_install_path(&self) -> Option<PathBuf> {
        match &self.environment {
            Environment::Conda { install_path, .. } => Some(install_path.clone()),
            _ => None,
        }
    }

    /// Resolve the explicit configuration the gateway is built from
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            storage_root: self.storage_path.clone(),
            interpreter: self.interpreter.program.clone(),
            interpreter_args: self.interpreter.args.clone(),
            shell: self.shell.clone(),
            environment: self.environment.clone(),
            completion_suffix: self.completion_suffix.clone(),
            default_timeout: self.timeout_ms.map(Duration::from_millis),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
        }
    }
}

/// Conda installation assumed when only an environment name is given
fn default_conda_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("anaconda3"))
        .unwrap_or_else(|| PathBuf::from("/opt/conda"))
}
