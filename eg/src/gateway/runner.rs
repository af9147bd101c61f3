//! Child process runner with separate output capture, timeout and cancellation

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Time between SIGTERM and SIGKILL when stopping a child
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How long to keep reading after SIGKILL before abandoning the pipes
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Program, arguments and surroundings of one child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

/// Why the child stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own; `None` when killed by a signal nobody here sent
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

/// Everything observed about one child process
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub termination: Termination,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Spawn the child, capture both pipes and wait for it
///
/// stdin is closed. The child counts as finished once it has exited and both
/// pipes are closed, so a background process still holding them keeps the
/// run open. With no timeout and no token the wait is unbounded. On timeout
/// or cancellation the child's process group is terminated and reaped before
/// this returns.
pub async fn run(
    spec: &ProcessSpec,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> std::io::Result<ProcessOutcome> {
    debug!(program = %spec.program, args = ?spec.args, ?timeout, "run: called");
    let start = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    // Own process group so a kill reaches grandchildren too
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let pid = child.id();
    debug!(?pid, "run: child spawned");

    let mut stdout = OutputPipe::spawn(child.stdout.take(), "stdout");
    let mut stderr = OutputPipe::spawn(child.stderr.take(), "stderr");

    let termination = wait(&mut child, pid, &mut stdout, &mut stderr, timeout, cancel).await?;
    debug!(?termination, "run: child finished");

    Ok(ProcessOutcome {
        termination,
        stdout: stdout.finish(),
        stderr: stderr.finish(),
        duration: start.elapsed(),
    })
}

async fn wait(
    child: &mut Child,
    pid: Option<u32>,
    stdout: &mut OutputPipe,
    stderr: &mut OutputPipe,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> std::io::Result<Termination> {
    let deadline = async {
        match timeout {
            Some(t) => tokio::time::sleep(t).await,
            None => std::future::pending::<()>().await,
        }
    };
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    let stopped = {
        let finished = async {
            let status = child.wait().await?;
            stdout.closed().await;
            stderr.closed().await;
            Ok::<_, std::io::Error>(status)
        };

        tokio::select! {
            status = finished => return Ok(Termination::Exited(status?.code())),
            () = deadline => Termination::TimedOut,
            () = cancelled => Termination::Cancelled,
        }
    };

    warn!(?stopped, ?pid, "wait: stopping child");
    stop_group(child, pid, stdout, stderr).await?;
    Ok(stopped)
}

/// SIGTERM the group, give it `KILL_GRACE` to exit and release the pipes,
/// then SIGKILL
///
/// The group outlives its leader, so this also works when the direct child
/// has already been reaped and only background processes remain.
#[cfg(unix)]
async fn stop_group(
    child: &mut Child,
    pid: Option<u32>,
    stdout: &mut OutputPipe,
    stderr: &mut OutputPipe,
) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return child.wait().await.map(|_| ());
    };
    let pgid = Pid::from_raw(pid as i32);

    let _ = killpg(pgid, Signal::SIGTERM);

    let graceful = tokio::time::timeout(KILL_GRACE, async {
        child.wait().await?;
        stdout.closed().await;
        stderr.closed().await;
        Ok::<_, std::io::Error>(())
    })
    .await;
    if let Ok(result) = graceful {
        return result;
    }

    debug!(%pid, "stop_group: grace period elapsed, sending SIGKILL");
    let _ = killpg(pgid, Signal::SIGKILL);
    child.wait().await?;

    // Processes that left the group may still hold the pipes
    let _ = tokio::time::timeout(DRAIN_GRACE, async {
        stdout.closed().await;
        stderr.closed().await;
    })
    .await;
    Ok(())
}

#[cfg(not(unix))]
async fn stop_group(
    child: &mut Child,
    _pid: Option<u32>,
    _stdout: &mut OutputPipe,
    _stderr: &mut OutputPipe,
) -> std::io::Result<()> {
    let _ = child.start_kill();
    child.wait().await.map(|_| ())
}

/// One captured pipe, read by its own task into a shared buffer
///
/// Whatever arrived before the run ended is kept, even when the reader is
/// still blocked on a pipe some other process holds open.
struct OutputPipe {
    name: &'static str,
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
    done: bool,
}

impl OutputPipe {
    fn spawn<R>(stream: Option<R>, name: &'static str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);

        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                    Err(e) => {
                        warn!(%name, %e, "OutputPipe: failed to read stream");
                        break;
                    }
                }
            }
        });

        Self {
            name,
            buf,
            task,
            done: false,
        }
    }

    /// Resolves once the pipe reached EOF
    async fn closed(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = (&mut self.task).await {
            warn!(name = %self.name, %e, "OutputPipe::closed: reader task failed");
        }
        self.done = true;
    }

    /// Stop reading and take what was captured
    fn finish(self) -> String {
        if !self.done {
            debug!(name = %self.name, "OutputPipe::finish: pipe still open, abandoning reader");
            self.task.abort();
        }
        match self.buf.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => String::new(),
        }
    }
}
