//! Terminal notifications fired once a run has finished

use crate::{
    core::config::NotificationConfig,
    execution::RunResult,
    shell::{CommandRequest, CommandRunner, ShellError},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification command could not run: {0}")]
    Shell(#[from] ShellError),

    #[error("notification command `{command}` exited with code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },
}

/// Receives the outcome of a run. Exactly one method is called per run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_success(&self, result: &RunResult) -> Result<(), NotifyError>;

    async fn on_failure(&self, result: &RunResult, failed_stage: &str) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_success(&self, result: &RunResult) -> Result<(), NotifyError> {
        info!(
            "Run {} of {} succeeded ({} stages)",
            result.run_id,
            result.pipeline_name,
            result.stages.len()
        );
        Ok(())
    }

    async fn on_failure(&self, result: &RunResult, failed_stage: &str) -> Result<(), NotifyError> {
        let reason = result
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        error!(
            "Run {} of {} failed at stage '{}': {}",
            result.run_id, result.pipeline_name, failed_stage, reason
        );
        Ok(())
    }
}

/// Runs the `notifications.on_success` / `notifications.on_failure` commands
///
/// Commands see `RUN_ID`, `RUN_STATUS`, `PIPELINE_NAME` and `FAILED_STAGE`
/// (empty on success) in their environment, plus every captured output.
pub struct CommandNotifier<R> {
    runner: R,
    config: NotificationConfig,
    cwd: PathBuf,
}

impl<R: CommandRunner> CommandNotifier<R> {
    pub fn new(runner: R, config: NotificationConfig) -> Self {
        Self {
            runner,
            config,
            cwd: std::env::temp_dir(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    async fn run_all(
        &self,
        commands: &[String],
        result: &RunResult,
        failed_stage: &str,
    ) -> Result<(), NotifyError> {
        let mut env: BTreeMap<String, String> = result
            .outputs
            .iter()
            .map(|(k, v)| (crate::core::env_name(k), v.clone()))
            .collect();
        env.insert("RUN_ID".to_string(), result.run_id.to_string());
        env.insert("RUN_STATUS".to_string(), result.status.as_str().to_string());
        env.insert("PIPELINE_NAME".to_string(), result.pipeline_name.clone());
        env.insert("FAILED_STAGE".to_string(), failed_stage.to_string());

        for command in commands {
            let request = CommandRequest::new(command.as_str(), self.cwd.clone()).with_env(env.clone());
            let output = self.runner.run(&request, None).await?;
            if !output.is_success() {
                return Err(NotifyError::CommandFailed {
                    command: command.clone(),
                    exit_code: output.exit_code,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R: CommandRunner> Notifier for CommandNotifier<R> {
    async fn on_success(&self, result: &RunResult) -> Result<(), NotifyError> {
        self.run_all(&self.config.on_success, result, "").await
    }

    async fn on_failure(&self, result: &RunResult, failed_stage: &str) -> Result<(), NotifyError> {
        self.run_all(&self.config.on_failure, result, failed_stage).await
    }
}
