//! External command execution
//!
//! Add-ons talk to the cluster exclusively through `helm` and `kubectl`
//! subprocesses. The `CommandRunner` trait is the seam: production code
//! spawns real processes, tests substitute a scripted mock.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use crate::error::{AddonError, Result};

/// Timeout for cheap liveness probes (cluster-info, helm version)
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for ordinary helm/kubectl queries
pub const HELM_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for chart installation, which pulls images
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best-effort error description: stderr when present, else stdout
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// A command to run, with environment overrides and a deadline
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: HELM_TIMEOUT,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rendered command line, for logs and mock matching
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Executes commands on behalf of add-ons
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Runner that spawns real subprocesses via tokio
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        tracing::debug!("Running: {}", request.command_line());

        let mut command = tokio::process::Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AddonError::MissingBinary {
                    program: request.program.clone(),
                }
            } else {
                AddonError::Io(e)
            }
        })?;

        let output = tokio::time::timeout(request.timeout, child.wait_with_output())
            .await
            .map_err(|_| AddonError::CommandTimeout {
                program: request.program.clone(),
                seconds: request.timeout.as_secs(),
            })??;

        // Signal-terminated processes report no code
        let exit_code = output.status.code().unwrap_or(-1);
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let request = CommandRequest::new("echo").args(["hello"]);
        let output = ProcessRunner.run(&request).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let request = CommandRequest::new("definitely-not-a-real-binary-xyz");
        let err = ProcessRunner.run(&request).await.unwrap_err();

        assert!(matches!(err, AddonError::MissingBinary { ref program } if program.contains("xyz")));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let request = CommandRequest::new("sleep")
            .args(["30"])
            .timeout(Duration::from_millis(50));
        let err = ProcessRunner.run(&request).await.unwrap_err();

        assert!(matches!(err, AddonError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let request = CommandRequest::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let output = ProcessRunner.run(&request).await.unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.error_text(), "oops");
    }

    #[test]
    fn test_error_text_falls_back_to_stdout() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "from stdout\n".to_string(),
            stderr: "  ".to_string(),
        };
        assert_eq!(output.error_text(), "from stdout");
    }

    #[test]
    fn test_command_line_rendering() {
        let request = CommandRequest::new("helm").args(["list", "-n", "kube-system"]);
        assert_eq!(request.command_line(), "helm list -n kube-system");
    }
}
