//! Command request and result types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error types for running a shell command
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    #[error("I/O error while reading command output: {0}")]
    Io(#[from] std::io::Error),
}

/// Whole seconds as `N seconds`, anything finer in milliseconds
pub fn format_timeout(timeout: &Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

/// A single command to run through the shell
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Fully rendered command line
    pub command: String,

    /// Working directory
    pub cwd: PathBuf,

    /// Extra environment variables for the process
    pub env: BTreeMap<String, String>,

    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a command that ran to completion (successfully or not)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code, -1 when the process was killed by a signal
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty stdout line, trimmed
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
    }

    /// Short description of a failure: exit code plus the tail of stderr
    pub fn failure_summary(&self) -> String {
        let tail: Vec<&str> = self
            .stderr
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let tail = &tail[tail.len().saturating_sub(3)..];

        if tail.is_empty() {
            format!("exited with code {}", self.exit_code)
        } else {
            format!("exited with code {}: {}", self.exit_code, tail.join(" | "))
        }
    }
}
