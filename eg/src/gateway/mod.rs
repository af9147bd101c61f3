//! Execution gateway
//!
//! Turns an [`ExecutionRequest`] into exactly one child process and one
//! [`ExecutionResult`]. Source payloads are persisted under the storage root
//! and run through the configured interpreter; command lines run through the
//! shell inside the configured [`Environment`].
//!
//! [`ExecutionGateway::submit`] reports every domain outcome as a status,
//! including persistence and spawn failures. [`ExecutionGateway::run_command`]
//! keeps the plain "stdout or error" contract for command lines.

mod environment;
mod error;
mod request;
mod result;
mod runner;
mod store;

pub use environment::Environment;
pub use error::GatewayError;
pub use request::{ArtifactName, ExecutionRequest};
pub use result::{ExecutionResult, ExecutionStatus};
pub use runner::{ProcessOutcome, ProcessSpec, Termination};
pub use store::ArtifactStore;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Appended to successful code output so the agent can close its turn
pub const COMPLETION_SUFFIX: &str = "\n\nIf you have completed all tasks, respond with FINAL ANSWER.";

/// Everything the gateway needs, resolved before construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Directory artifacts are written to
    pub storage_root: PathBuf,

    /// Program that runs persisted artifacts
    pub interpreter: String,

    /// Arguments placed before the artifact path
    pub interpreter_args: Vec<String>,

    /// Shell used for command lines
    pub shell: String,

    /// Activation context for command lines
    pub environment: Environment,

    /// Appended to stdout of successful source payloads
    pub completion_suffix: String,

    /// Applied when a submission carries no timeout of its own
    pub default_timeout: Option<Duration>,

    /// Working directory of children; inherited when unset
    pub working_dir: Option<PathBuf>,

    /// Extra variables set for every child on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./data_storage/"),
            interpreter: "python3".to_string(),
            interpreter_args: Vec::new(),
            shell: "bash".to_string(),
            environment: Environment::None,
            completion_suffix: COMPLETION_SUFFIX.to_string(),
            default_timeout: None,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// Per-call knobs for [`ExecutionGateway::submit`]
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Overrides the configured default timeout
    pub timeout: Option<Duration>,

    /// Fires to stop the child early
    pub cancel: Option<CancellationToken>,
}

impl SubmitOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// The execution gateway
///
/// Holds no mutable state; share it behind an `Arc` to submit concurrently.
#[derive(Debug)]
pub struct ExecutionGateway {
    config: GatewayConfig,
    store: ArtifactStore,
}

impl ExecutionGateway {
    /// Create a gateway, creating the storage root if absent
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        debug!(?config, "ExecutionGateway::new: called");
        let store = ArtifactStore::open(&config.storage_root)?;
        info!(
            "Gateway ready: storage={}, interpreter={}, environment={}",
            config.storage_root.display(),
            config.interpreter,
            config.environment.describe()
        );
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run one request to completion
    pub async fn submit(&self, request: &ExecutionRequest, options: &SubmitOptions) -> ExecutionResult {
        debug!(kind = request.kind(), "ExecutionGateway::submit: called");
        match request {
            ExecutionRequest::SourcePayload { name, body } => self.submit_source(name, body, options).await,
            ExecutionRequest::CommandLine { text } => self.submit_command(text, options).await,
        }
    }

    /// Persist and run a source payload given an unvalidated name
    ///
    /// An invalid name becomes an `InternalError` result, like any other
    /// persistence failure.
    pub async fn execute_code(&self, name: &str, body: &str, options: &SubmitOptions) -> ExecutionResult {
        debug!(%name, "ExecutionGateway::execute_code: called");
        match ArtifactName::new(name) {
            Ok(name) => self.submit_source(&name, body, options).await,
            Err(e) => {
                warn!(%e, "ExecutionGateway::execute_code: rejected artifact name");
                ExecutionResult::internal_error(e.to_string(), None)
            }
        }
    }

    /// Run a command line, returning stdout or raising on any non-success
    pub async fn run_command(&self, text: &str, options: &SubmitOptions) -> Result<String, GatewayError> {
        debug!(%text, "ExecutionGateway::run_command: called");
        let result = self.submit_command(text, options).await;

        match result.status {
            ExecutionStatus::Success => Ok(result.stdout),
            ExecutionStatus::Failure => {
                error!("Error executing command: {}", result.stderr);
                Err(GatewayError::CommandExecution {
                    exit_code: result.exit_code.unwrap_or(-1),
                    stderr: result.stderr,
                })
            }
            ExecutionStatus::Timeout => Err(GatewayError::Timeout {
                timeout_ms: self.effective_timeout(options).map(|t| t.as_millis() as u64).unwrap_or(0),
            }),
            ExecutionStatus::Cancelled => Err(GatewayError::Cancelled),
            ExecutionStatus::InternalError => Err(GatewayError::Internal(result.stderr)),
        }
    }

    async fn submit_source(&self, name: &ArtifactName, body: &str, options: &SubmitOptions) -> ExecutionResult {
        debug!(%name, "ExecutionGateway::submit_source: called");
        if Self::already_cancelled(options) {
            return ExecutionResult::cancelled();
        }

        let path = match self.store.persist(name, body) {
            Ok(path) => path,
            Err(e) => {
                error!(%e, "Failed to persist artifact");
                return ExecutionResult::internal_error(e.to_string(), Some(self.store.path_for(name)));
            }
        };

        let mut args = self.config.interpreter_args.clone();
        args.push(path.to_string_lossy().into_owned());
        let spec = self.process(ProcessSpec::new(&self.config.interpreter, args));

        let mut result = self.execute(spec, options).await;
        result.artifact_path = Some(path);

        match result.status {
            ExecutionStatus::Success => {
                info!("Code executed successfully");
                result.stdout.push_str(&self.config.completion_suffix);
            }
            ExecutionStatus::Failure => error!("Code execution failed: {}", result.stderr),
            _ => {}
        }
        result
    }

    async fn submit_command(&self, text: &str, options: &SubmitOptions) -> ExecutionResult {
        debug!(%text, "ExecutionGateway::submit_command: called");
        if Self::already_cancelled(options) {
            return ExecutionResult::cancelled();
        }
        info!("Executing command: {}", text);

        let spec = self.process(self.config.environment.command(&self.config.shell, text));

        let result = self.execute(spec, options).await;
        if result.is_success() {
            info!("Command executed successfully");
        }
        result
    }

    /// Spawn exactly one child and fold its outcome into a result
    async fn execute(&self, spec: ProcessSpec, options: &SubmitOptions) -> ExecutionResult {
        let timeout = self.effective_timeout(options);
        debug!(program = %spec.program, ?timeout, "ExecutionGateway::execute: called");

        let outcome = match runner::run(&spec, timeout, options.cancel.as_ref()).await {
            Ok(outcome) => outcome,
            Err(source) => {
                let e = GatewayError::Spawn {
                    program: spec.program.clone(),
                    source,
                };
                error!(%e, "An error occurred while executing");
                return ExecutionResult::internal_error(e.to_string(), None);
            }
        };

        let (status, exit_code) = match outcome.termination {
            Termination::Exited(Some(0)) => (ExecutionStatus::Success, Some(0)),
            Termination::Exited(Some(code)) => (ExecutionStatus::Failure, Some(code)),
            // Killed by a signal from elsewhere; no exit code to report
            Termination::Exited(None) => (ExecutionStatus::Failure, None),
            Termination::TimedOut => (ExecutionStatus::Timeout, None),
            Termination::Cancelled => (ExecutionStatus::Cancelled, None),
        };

        debug!(%status, ?exit_code, "ExecutionGateway::execute: finished");
        ExecutionResult {
            status,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code,
            artifact_path: None,
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }

    /// Apply the configured working directory and extra variables
    fn process(&self, spec: ProcessSpec) -> ProcessSpec {
        let env = self.config.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        spec.with_cwd(self.config.working_dir.clone()).with_env(env)
    }

    fn already_cancelled(options: &SubmitOptions) -> bool {
        let cancelled = options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
        if cancelled {
            debug!("ExecutionGateway: token already cancelled, nothing persisted or spawned");
        }
        cancelled
    }

    fn effective_timeout(&self, options: &SubmitOptions) -> Option<Duration> {
        options.timeout.or(self.config.default_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    fn sh_gateway() -> (TempDir, ExecutionGateway) {
        let temp = tempdir().unwrap();
        let config = GatewayConfig {
            storage_root: temp.path().join("data_storage"),
            interpreter: "sh".to_string(),
            shell: "sh".to_string(),
            ..Default::default()
        };
        let gateway = ExecutionGateway::new(config).unwrap();
        (temp, gateway)
    }

    fn opts() -> SubmitOptions {
        SubmitOptions::default().with_timeout(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_new_creates_storage_root() {
        let (temp, gateway) = sh_gateway();
        assert!(temp.path().join("data_storage").is_dir());
        assert_eq!(gateway.store().root(), temp.path().join("data_storage").as_path());
    }

    #[tokio::test]
    async fn test_source_payload_persists_exact_body() {
        let (temp, gateway) = sh_gateway();
        let body = "echo ok\n# no trailing newline";
        let request = ExecutionRequest::source("job.sh", body).unwrap();

        let result = gateway.submit(&request, &opts()).await;

        let path = temp.path().join("data_storage").join("job.sh");
        assert_eq!(result.artifact_path.as_deref(), Some(path.as_path()));
        assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_relative_storage_root_runs_from_other_working_dir() {
        let local = tempfile::tempdir_in(".").unwrap();
        let work = tempdir().unwrap();
        let gateway = ExecutionGateway::new(GatewayConfig {
            storage_root: local.path().join("data_storage"),
            interpreter: "sh".to_string(),
            working_dir: Some(work.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let result = gateway.execute_code("p.sh", "echo ok", &opts()).await;

        assert_eq!(result.status, ExecutionStatus::Success, "stderr: {}", result.stderr);
        assert!(result.stdout.starts_with("ok\n"));
        assert!(result.artifact_path.unwrap().is_absolute());
    }

    #[tokio::test]
    async fn test_successful_payload_gets_completion_suffix() {
        let (_temp, gateway) = sh_gateway();
        let request = ExecutionRequest::source("ok.sh", "echo ok").unwrap();

        let result = gateway.submit(&request, &opts()).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, format!("ok\n{}", COMPLETION_SUFFIX));
        assert_eq!(result.stderr, "");
    }

    #[tokio::test]
    async fn test_failing_payload_reports_stderr_and_partial_stdout() {
        let (_temp, gateway) = sh_gateway();
        let request = ExecutionRequest::source("fail.sh", "echo before\necho boom >&2\nexit 1\n").unwrap();

        let result = gateway.submit(&request, &opts()).await;

        assert_eq!(result.status, ExecutionStatus::Failure);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.stdout, "before\n");
        assert_eq!(result.stderr, "boom\n");
        assert!(result.artifact_path.is_some());
    }

    #[tokio::test]
    async fn test_same_name_overwrites() {
        let (temp, gateway) = sh_gateway();

        gateway
            .submit(&ExecutionRequest::source("x.sh", "echo first; echo more").unwrap(), &opts())
            .await;
        let result = gateway
            .submit(&ExecutionRequest::source("x.sh", "echo second").unwrap(), &opts())
            .await;

        let content = fs::read_to_string(temp.path().join("data_storage").join("x.sh")).unwrap();
        assert_eq!(content, "echo second");
        assert!(result.stdout.starts_with("second\n"));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (_temp, gateway) = sh_gateway();
        let request = ExecutionRequest::source("same.sh", "echo out; echo err >&2").unwrap();

        let first = gateway.submit(&request, &opts()).await;
        let second = gateway.submit(&request, &opts()).await;

        assert_eq!(first.status, second.status);
        assert_eq!(first.stdout, second.stdout);
        assert_eq!(first.stderr, second.stderr);
    }

    #[tokio::test]
    async fn test_invalid_name_is_internal_error_without_write() {
        let (temp, gateway) = sh_gateway();

        let result = gateway.execute_code("../escape.sh", "touch pwned", &opts()).await;

        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.exit_code, None);
        assert!(result.stderr.contains("path separator"));
        assert!(!temp.path().join("escape.sh").exists());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_internal_error() {
        let (temp, gateway) = sh_gateway();
        // A directory already occupies the artifact path
        fs::create_dir(temp.path().join("data_storage").join("taken")).unwrap();

        let result = gateway.execute_code("taken", "echo hi", &opts()).await;

        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.exit_code, None);
        assert!(result.stderr.contains("Failed to write artifact"));
        assert!(result.artifact_path.is_some());
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_internal_error() {
        let temp = tempdir().unwrap();
        let gateway = ExecutionGateway::new(GatewayConfig {
            storage_root: temp.path().to_path_buf(),
            interpreter: "no-such-interpreter-eg".to_string(),
            ..Default::default()
        })
        .unwrap();

        let result = gateway.execute_code("a.py", "print(1)", &opts()).await;

        assert_eq!(result.status, ExecutionStatus::InternalError);
        assert_eq!(result.exit_code, None);
        assert!(result.stderr.contains("no-such-interpreter-eg"));
        assert_eq!(result.artifact_path, Some(temp.path().join("a.py")));
    }

    #[tokio::test]
    async fn test_command_line_echo() {
        let (_temp, gateway) = sh_gateway();

        let result = gateway.submit(&ExecutionRequest::command("echo hello"), &opts()).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.artifact_path, None);
    }

    #[tokio::test]
    async fn test_run_command_returns_stdout() {
        let (_temp, gateway) = sh_gateway();

        let stdout = gateway.run_command("echo hello", &opts()).await.unwrap();

        assert_eq!(stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_run_command_raises_on_nonzero_exit() {
        let (_temp, gateway) = sh_gateway();

        let err = gateway
            .run_command("echo nope >&2; exit 4", &opts())
            .await
            .unwrap_err();

        match err {
            GatewayError::CommandExecution { exit_code, stderr } => {
                assert_eq!(exit_code, 4);
                assert_eq!(stderr, "nope\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_timeout() {
        let (_temp, gateway) = sh_gateway();
        let options = SubmitOptions::default().with_timeout(Duration::from_millis(200));

        let result = gateway.submit(&ExecutionRequest::command("sleep 30"), &options).await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_default_timeout_applies_to_source_payload() {
        let temp = tempdir().unwrap();
        let gateway = ExecutionGateway::new(GatewayConfig {
            storage_root: temp.path().to_path_buf(),
            interpreter: "sh".to_string(),
            default_timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        })
        .unwrap();

        let result = gateway.execute_code("slow.sh", "sleep 30", &SubmitOptions::default()).await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.artifact_path, Some(temp.path().join("slow.sh")));
    }

    #[tokio::test]
    async fn test_run_command_cancelled() {
        let (_temp, gateway) = sh_gateway();
        let token = CancellationToken::new();
        token.cancel();

        let err = gateway
            .run_command("sleep 30", &SubmitOptions::default().with_cancel(token))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_persist_and_spawn() {
        let (temp, gateway) = sh_gateway();
        let token = CancellationToken::new();
        token.cancel();
        let options = SubmitOptions::default().with_cancel(token);

        let result = gateway.execute_code("late.sh", "touch spawned", &options).await;

        assert_eq!(result.status, ExecutionStatus::Cancelled);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.artifact_path, None);
        assert!(!temp.path().join("data_storage").join("late.sh").exists());

        let result = gateway.submit(&ExecutionRequest::command("touch spawned"), &options).await;
        assert_eq!(result.status, ExecutionStatus::Cancelled);
        assert!(!std::path::Path::new("spawned").exists());
    }

    #[tokio::test]
    async fn test_timeout_with_background_process_holding_output() {
        let (_temp, gateway) = sh_gateway();
        let options = SubmitOptions::default().with_timeout(Duration::from_millis(500));
        let start = std::time::Instant::now();

        let result = gateway
            .submit(&ExecutionRequest::command("sleep 6 & echo started"), &options)
            .await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.stdout, "started\n");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_foreign_signal_is_failure_without_exit_code() {
        let (_temp, gateway) = sh_gateway();

        let result = gateway.submit(&ExecutionRequest::command("kill -9 $$"), &opts()).await;

        assert_eq!(result.status, ExecutionStatus::Failure);
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_configured_env_reaches_children() {
        let temp = tempdir().unwrap();
        let gateway = ExecutionGateway::new(GatewayConfig {
            storage_root: temp.path().to_path_buf(),
            interpreter: "sh".to_string(),
            shell: "sh".to_string(),
            env: BTreeMap::from([("EG_GREETING".to_string(), "hi".to_string())]),
            ..Default::default()
        })
        .unwrap();

        let stdout = gateway.run_command("echo \"$EG_GREETING\"", &opts()).await.unwrap();
        assert_eq!(stdout, "hi\n");

        let result = gateway.execute_code("env.sh", "printf %s \"$EG_GREETING\"", &opts()).await;
        assert_eq!(result.stdout, format!("hi{}", COMPLETION_SUFFIX));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_with_distinct_names() {
        let (_temp, gateway) = sh_gateway();
        let gateway = Arc::new(gateway);

        let mut handles = Vec::new();
        for i in 0..4 {
            let gw = Arc::clone(&gateway);
            handles.push(tokio::spawn(async move {
                gw.execute_code(&format!("job{i}.sh"), &format!("echo {i}"), &opts()).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            assert_eq!(result.status, ExecutionStatus::Success);
            assert!(result.stdout.starts_with(&format!("{i}\n")));
        }
    }

    #[tokio::test]
    async fn test_conda_activation_with_hostile_install_path() {
        let temp = tempdir().unwrap();
        let install = temp.path().join("conda; touch pwned");
        fs::create_dir_all(install.join("etc").join("profile.d")).unwrap();
        fs::write(
            install.join("etc").join("profile.d").join("conda.sh"),
            "conda() { export ACTIVE_ENV=\"$2\"; }\n",
        )
        .unwrap();

        let gateway = ExecutionGateway::new(GatewayConfig {
            storage_root: temp.path().join("store"),
            shell: "sh".to_string(),
            environment: Environment::Conda {
                install_path: install,
                name: "dcbot".to_string(),
            },
            working_dir: Some(temp.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let stdout = gateway.run_command("echo \"$ACTIVE_ENV\"", &opts()).await.unwrap();

        assert_eq!(stdout, "dcbot\n");
        assert!(!temp.path().join("pwned").exists());
    }
}
