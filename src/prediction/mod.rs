//! External prediction step.
//!
//! Runs the configured program (the end-of-month saldo prediction script)
//! as a managed subprocess and classifies the result. A run succeeds only
//! if the process exits 0 and writes nothing to stderr.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::PredictionConfig;
use crate::types::SaldoError;

/// Captured output of one run.
#[derive(Debug)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ScriptOutput {
    /// Trimmed stdout on success, otherwise a `ScriptFailure`.
    pub fn classify(self) -> Result<String, SaldoError> {
        if self.exit_code != 0 {
            return Err(SaldoError::ScriptFailure(format!(
                "exit code {}: {}",
                self.exit_code,
                self.stderr.trim()
            )));
        }
        if !self.stderr.trim().is_empty() {
            return Err(SaldoError::ScriptFailure(self.stderr.trim().to_string()));
        }
        Ok(self.stdout.trim().to_string())
    }
}

pub struct PredictionRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl PredictionRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &PredictionConfig) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Run the script once and classify its output.
    pub async fn run(&self) -> Result<String, SaldoError> {
        let result = self.execute().await.and_then(ScriptOutput::classify);
        match &result {
            Ok(output) => info!(program = %self.program, output = %output, "Prediction script output"),
            Err(e) => error!(program = %self.program, error = %e, "Prediction script failed"),
        }
        result
    }

    async fn execute(&self) -> Result<ScriptOutput, SaldoError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SaldoError::ScriptFailure(format!("failed to start {}: {e}", self.program)))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let result = timeout(self.timeout, async {
            // Drain both pipes together so a chatty stream can't block the child.
            let stdout_handle = async move {
                let mut stdout = String::new();
                if let Some(mut out) = stdout_pipe {
                    out.read_to_string(&mut stdout).await?;
                }
                Ok::<_, std::io::Error>(stdout)
            };

            let stderr_handle = async move {
                let mut stderr = String::new();
                if let Some(mut err) = stderr_pipe {
                    err.read_to_string(&mut stderr).await?;
                }
                Ok::<_, std::io::Error>(stderr)
            };

            let (stdout_result, stderr_result) = tokio::join!(stdout_handle, stderr_handle);
            let stdout = stdout_result?;
            let stderr = stderr_result?;

            let status = child.wait().await?;

            Ok::<_, std::io::Error>(ScriptOutput {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
            })
        })
        .await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(SaldoError::ScriptFailure(e.to_string())),
            Err(_) => {
                let _ = child.kill().await;
                Err(SaldoError::ScriptFailure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
