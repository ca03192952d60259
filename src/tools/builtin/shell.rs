//! `local_shell` handler: runs exec actions as subprocesses.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

use crate::error::RondoError;
use crate::tools::{ToolDefinition, ToolHandler, ToolInvocation};
use crate::types::{LocalShellAction, OutputItem, ToolOutput};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_OUTPUT_BYTES: usize = 32_768;

/// Runs `local_shell_call` actions with `tokio::process`.
///
/// The action's argv is executed directly (no shell), with its working
/// directory, environment and timeout. The output reports stdout, stderr
/// and the exit code; a non-zero exit is still a completed output.
#[derive(Debug, Clone)]
pub struct LocalShellTool {
    definition: ToolDefinition,
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for LocalShellTool {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalShellTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::local_shell(),
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Timeout used when the action does not carry one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    async fn run(&self, call_id: &str, action: &LocalShellAction) -> Result<serde_json::Value, RondoError> {
        let (program, args) = action
            .command
            .split_first()
            .ok_or_else(|| RondoError::InvalidArguments {
                call_id: call_id.to_string(),
                message: "empty command".into(),
            })?;
        if let Some(user) = &action.user {
            tracing::debug!(call_id, user, "ignoring requested user for local shell call");
        }

        let mut command = Command::new(program);
        command.args(args).envs(&action.env).kill_on_drop(true);
        if let Some(dir) = &action.working_directory {
            command.current_dir(dir);
        }

        let timeout = action
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.timeout);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RondoError::HandlerExecution {
                    tool_name: "local_shell".into(),
                    message: format!("failed to spawn {program}: {e}"),
                })
            }
            Err(_) => {
                return Err(RondoError::HandlerExecution {
                    tool_name: "local_shell".into(),
                    message: format!("command timed out after {}ms", timeout.as_millis()),
                })
            }
        };

        let stdout = truncate_utf8(&String::from_utf8_lossy(&output.stdout), self.max_output_bytes);
        let stderr = truncate_utf8(&String::from_utf8_lossy(&output.stderr), self.max_output_bytes);
        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": output.status.code(),
        }))
    }
}

#[async_trait]
impl ToolHandler for LocalShellTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RondoError> {
        let OutputItem::LocalShellCall(call) = invocation.item() else {
            return Err(RondoError::HandlerExecution {
                tool_name: "local_shell".into(),
                message: format!("cannot run {} item", invocation.item().type_name()),
            });
        };
        let result = self.run(invocation.call_id(), &call.action).await?;
        Ok(invocation.json(&result))
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    format!("{}\n... (truncated)", &s[..cutoff])
}
