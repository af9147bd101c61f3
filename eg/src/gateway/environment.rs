//! Runtime environments a command line is activated in

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use super::runner::ProcessSpec;

/// Value passed as `$0` to the activation script
const SCRIPT_NAME: &str = "execgate";

/// A named runtime context resolved from configuration
///
/// Activation scripts are constant strings. Install paths, environment names
/// and the command text reach the shell as positional parameters, so none of
/// them are ever parsed as part of the script itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Environment {
    /// Plain shell, no activation
    #[default]
    None,

    /// Conda environment activated via `<install-path>/etc/profile.d/conda.sh`
    Conda {
        #[serde(rename = "install-path")]
        install_path: PathBuf,
        name: String,
    },

    /// Python virtualenv activated via `<path>/bin/activate`
    Venv { path: PathBuf },
}

impl Environment {
    /// Build the argument vector that runs `text` inside this environment
    pub fn command(&self, shell: &str, text: &str) -> ProcessSpec {
        debug!(env = %self.describe(), %shell, "Environment::command: called");
        let (script, mut params) = match self {
            Self::None => ("eval \"$1\"", vec![]),
            Self::Conda { install_path, name } => (
                ". \"$1/etc/profile.d/conda.sh\" && conda activate \"$2\" && eval \"$3\"",
                vec![install_path.to_string_lossy().into_owned(), name.clone()],
            ),
            Self::Venv { path } => (
                ". \"$1/bin/activate\" && eval \"$2\"",
                vec![path.to_string_lossy().into_owned()],
            ),
        };
        params.push(text.to_string());

        let mut args = vec!["-c".to_string(), script.to_string(), SCRIPT_NAME.to_string()];
        args.extend(params);

        ProcessSpec::new(shell, args)
    }

    /// Human-readable label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::Conda { install_path, name } => format!("conda:{}@{}", name, install_path.display()),
            Self::Venv { path } => format!("venv:{}", path.display()),
        }
    }
}
