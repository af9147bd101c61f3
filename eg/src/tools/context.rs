//! ToolContext - execution context for tools

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::gateway::{ExecutionGateway, SubmitOptions};

/// Execution context shared by the tools of one agent
///
/// Cancelling the token stops whatever child a tool is currently waiting on.
#[derive(Clone)]
pub struct ToolContext {
    /// Gateway every tool executes through
    pub gateway: Arc<ExecutionGateway>,

    /// Cancels in-flight executions
    pub cancel: CancellationToken,
}

impl ToolContext {
    /// Create a new tool context
    pub fn new(gateway: Arc<ExecutionGateway>) -> Self {
        debug!("ToolContext::new: called");
        Self {
            gateway,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a context driven by an existing cancellation token
    pub fn with_cancel(gateway: Arc<ExecutionGateway>, cancel: CancellationToken) -> Self {
        debug!("ToolContext::with_cancel: called");
        Self { gateway, cancel }
    }

    /// Submit options for one call, with an optional per-call timeout
    pub fn submit_options(&self, timeout_ms: Option<u64>) -> SubmitOptions {
        debug!(?timeout_ms, "ToolContext::submit_options: called");
        let options = SubmitOptions::default().with_cancel(self.cancel.clone());
        match timeout_ms {
            Some(ms) => options.with_timeout(Duration::from_millis(ms)),
            None => options,
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("storage_root", &self.gateway.config().storage_root)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
