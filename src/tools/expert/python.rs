//! Python execution tool
//!
//! Runs a snippet in a fresh interpreter process and returns what it printed.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tool for running Python code
#[derive(Debug, Clone)]
pub struct PythonTool {
    python_bin: String,
    timeout: Duration,
}

impl PythonTool {
    /// Create a tool that runs the given interpreter
    pub fn new(python_bin: &str) -> Self {
        Self {
            python_bin: python_bin.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the execution timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, code: &str) -> Result<String> {
        let mut child = Command::new(&self.python_bin)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConclaveError::external(format!("failed to start {}: {}", self.python_bin, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(code.as_bytes()).await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ConclaveError::external(format!(
                    "python timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(ConclaveError::external(format!(
                "python exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut result = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            result.push_str("\n[stderr]\n");
            result.push_str(stderr.trim());
        }
        if result.is_empty() {
            result.push_str("(no output; use print() to show results)");
        }
        Ok(result)
    }
}

#[async_trait]
impl Tool for PythonTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "python",
            "Run a Python 3 snippet and return its printed output. Print the values you need.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python source to execute"
                    }
                },
                "required": ["code"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Expert
    }

    async fn call(&self, call: &ToolCall) -> Result<String> {
        let code = call.require_string("code")?;
        self.run(&code).await
    }
}
