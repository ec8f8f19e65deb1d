//! Stage executor - runs the actions of a single stage

use crate::{
    core::{render, RunContext, Stage, StageError},
    shell::{CommandRequest, CommandRunner, OutputCallback, ShellError},
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of executing a stage's actions
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Every action exited with status 0
    Succeeded {
        output: String,
        actions_run: usize,
        /// `(variable, value)` stored by the stage's capture
        captured: Option<(String, String)>,
    },
    /// An action failed; the remaining actions were not started
    Failed {
        error: StageError,
        actions_run: usize,
    },
}

/// A post-action that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostActionFailure {
    pub command: String,
    pub reason: String,
}

/// Hook notified right before each action is launched
pub trait ActionObserver: Send + Sync {
    fn action_started(&self, stage: &str, index: usize, command: &str);
}

/// Executes a single stage
pub struct StageExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StageExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run the stage's actions in order, stopping at the first failure
    ///
    /// A successful stage with a `capture` stores the trimmed last stdout
    /// line of its final action into `context`.
    pub async fn execute(
        &self,
        stage: &Stage,
        context: &mut RunContext,
        observer: Option<&dyn ActionObserver>,
        callback: Option<&dyn OutputCallback>,
    ) -> StageOutcome {
        info!("Executing stage: {} ({})", stage.name, stage.kind.as_str());

        let mut combined = String::new();
        let mut last_output = None;

        for (index, action) in stage.actions.iter().enumerate() {
            let fail = |reason: String| StageOutcome::Failed {
                error: StageError::for_kind(stage.kind, &stage.name, reason),
                actions_run: index,
            };

            let command = match render(action, context.rendering_variables()) {
                Ok(command) => command,
                Err(unresolved) => {
                    error!(
                        "Stage {} references undefined variable '{}'",
                        stage.name, unresolved.0
                    );
                    return fail(format!(
                        "unresolved variable '{}' in action {}",
                        unresolved.0,
                        index + 1
                    ));
                }
            };

            if let Some(observer) = observer {
                observer.action_started(&stage.name, index, &command);
            }
            debug!("Stage {} action {}: {}", stage.name, index + 1, command);

            let request = self.request(stage, context, &command);
            let output = match self.runner.run(&request, callback).await {
                Ok(output) => output,
                Err(e) => {
                    error!("Stage {} action {} could not run: {}", stage.name, index + 1, e);
                    return fail(describe_shell_error(&command, &e));
                }
            };

            if !output.is_success() {
                warn!(
                    "Stage {} action {} exited with code {}",
                    stage.name,
                    index + 1,
                    output.exit_code
                );
                return StageOutcome::Failed {
                    error: StageError::for_kind(
                        stage.kind,
                        &stage.name,
                        format!("`{}` {}", command, output.failure_summary()),
                    ),
                    actions_run: index + 1,
                };
            }

            combined.push_str(&output.stdout);
            last_output = Some(output);
        }

        let actions_run = stage.actions.len();
        let captured = match (&stage.capture, &last_output) {
            (Some(variable), Some(output)) => match output.last_line() {
                Some(value) => {
                    info!("Stage {} captured {} = {}", stage.name, variable, value);
                    context.capture(variable, value.to_string());
                    Some((variable.clone(), value.to_string()))
                }
                None => {
                    return StageOutcome::Failed {
                        error: StageError::for_kind(
                            stage.kind,
                            &stage.name,
                            format!("nothing to capture into '{}': last action printed no output", variable),
                        ),
                        actions_run,
                    };
                }
            },
            _ => None,
        };

        info!("Stage {} succeeded", stage.name);
        StageOutcome::Succeeded {
            output: combined,
            actions_run,
            captured,
        }
    }

    /// Run every post-action of the stage, whatever the stage outcome
    ///
    /// Each post-action is attempted even if an earlier one failed. Failures
    /// are returned for reporting only.
    pub async fn run_post_actions(
        &self,
        stage: &Stage,
        context: &RunContext,
        callback: Option<&dyn OutputCallback>,
    ) -> Vec<PostActionFailure> {
        let mut failures = Vec::new();

        for action in stage.post_actions() {
            let command = match render(action, context.rendering_variables()) {
                Ok(command) => command,
                Err(unresolved) => {
                    failures.push(PostActionFailure {
                        command: action.clone(),
                        reason: format!("unresolved variable '{}'", unresolved.0),
                    });
                    continue;
                }
            };

            debug!("Stage {} post-action: {}", stage.name, command);
            let request = self.request(stage, context, &command);
            let reason = match self.runner.run(&request, callback).await {
                Ok(output) if output.is_success() => continue,
                Ok(output) => output.failure_summary(),
                Err(e) => e.to_string(),
            };

            warn!("Post-action of stage {} failed: {}", stage.name, reason);
            failures.push(PostActionFailure { command, reason });
        }

        failures
    }

    fn request(&self, stage: &Stage, context: &RunContext, command: &str) -> CommandRequest {
        CommandRequest::new(command, context.workspace.clone())
            .with_env(context.process_env().clone())
            .with_timeout(Duration::from_secs(stage.timeout_secs))
    }
}

fn describe_shell_error(command: &str, error: &ShellError) -> String {
    match error {
        ShellError::Timeout(_) => format!("`{}` {}", command, error),
        other => format!("`{}` could not run: {}", command, other),
    }
}
