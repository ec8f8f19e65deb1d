//! Main execution engine - orchestrates an entire run

use crate::{
    core::{Pipeline, RunConfig, RunContext, RunState, StageError, StageState},
    execution::{
        ActionObserver, EventBus, EventHandler, ExecutionEvent, Notifier, RunResult,
        RunWorkspace, StageExecutor, StageOutcome, StageRecord,
    },
    shell::CommandRunner,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

impl ActionObserver for EventBus {
    fn action_started(&self, stage: &str, index: usize, command: &str) {
        self.emit(ExecutionEvent::ActionStarted {
            stage: stage.to_string(),
            index,
            command: command.to_string(),
        });
    }
}

/// Main pipeline execution engine
///
/// Stages run strictly in declared order. The first failing stage ends the
/// run: every later stage is reported as skipped. Post-actions of every stage
/// that ran are always attempted.
pub struct ExecutionEngine<R> {
    executor: Arc<StageExecutor<R>>,
    notifiers: Vec<Arc<dyn Notifier>>,
    events: EventBus,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: Arc::new(StageExecutor::new(runner)),
            notifiers: Vec::new(),
            events: EventBus::new(),
        }
    }

    /// Add a notifier fired once the run has finished
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.events.subscribe(handler);
    }

    pub fn runner(&self) -> &R {
        self.executor.runner()
    }

    /// Execute every stage of the pipeline against `config.source_ref`
    pub async fn run(&self, pipeline: &Pipeline, config: &RunConfig) -> RunResult {
        let run_id = config.run_id;
        let started_at = Utc::now();
        let mut state = RunState::new();
        state.start(pipeline.stages.len());

        info!(
            "Starting run {} of pipeline {} at {}",
            run_id, pipeline.name, config.source_ref
        );
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
            source_ref: config.source_ref.clone(),
            total_stages: pipeline.stages.len(),
        });

        let mut records: Vec<StageRecord> = pipeline
            .stages
            .iter()
            .map(|s| StageRecord::pending(&s.name, s.kind))
            .collect();
        let mut failure: Option<StageError> = None;
        let mut outputs = Default::default();

        match RunWorkspace::create(&config.workspace_root, &pipeline.slug(), run_id, config.keep_workspace).await {
            Ok(workspace) => {
                let mut context = RunContext::new(config, workspace.path().to_path_buf());
                failure = self
                    .run_stages(pipeline, &mut context, &mut records, &mut state)
                    .await;
                outputs = context.captured().clone();
                workspace.finish().await;
            }
            Err(e) => {
                error!("Could not create workspace under {}: {}", config.workspace_root.display(), e);
                if let Some(first) = pipeline.stages.first() {
                    let error = StageError::for_kind(
                        first.kind,
                        &first.name,
                        format!("could not create workspace: {}", e),
                    );
                    let now = Utc::now();
                    records[0].state = StageState::Failed {
                        error: error.clone(),
                        actions_run: 0,
                        started_at: now,
                        failed_at: now,
                    };
                    self.events.emit(ExecutionEvent::StageFailed {
                        stage: first.name.clone(),
                        error: error.clone(),
                    });
                    failure = Some(error);
                    self.skip_remaining(&mut records, 1, &first.name);
                }
            }
        }

        let failed_stage = failure.as_ref().map(|e| e.stage().to_string());
        match &failure {
            Some(_) => state.fail(),
            None => state.succeed(),
        }

        let result = RunResult {
            run_id,
            pipeline_name: pipeline.name.clone(),
            source_ref: config.source_ref.clone(),
            status: state.status,
            stages: records,
            failed_stage: failed_stage.clone(),
            error: failure,
            outputs,
            started_at,
            completed_at: state.completed_at.unwrap_or_else(Utc::now),
        };

        self.notify(&result).await;

        info!("Run {} finished: {}", run_id, result.status.as_str());
        self.events.emit(ExecutionEvent::RunCompleted {
            run_id,
            status: result.status,
            failed_stage,
        });

        result
    }

    /// Run stages in order; returns the error of the first failed stage
    async fn run_stages(
        &self,
        pipeline: &Pipeline,
        context: &mut RunContext,
        records: &mut [StageRecord],
        state: &mut RunState,
    ) -> Option<StageError> {
        for (index, stage) in pipeline.stages.iter().enumerate() {
            let started_at = Utc::now();
            records[index].state = StageState::Running { started_at };
            self.events.emit(ExecutionEvent::StageStarted {
                stage: stage.name.clone(),
                index,
            });

            let output = self.events.stage_output(&stage.name);
            let outcome = self
                .executor
                .execute(stage, context, Some(&self.events), Some(&output))
                .await;

            let post_failures = self
                .executor
                .run_post_actions(stage, context, Some(&output))
                .await;
            for failure in &post_failures {
                self.events.emit(ExecutionEvent::PostActionFailed {
                    stage: stage.name.clone(),
                    command: failure.command.clone(),
                    reason: failure.reason.clone(),
                });
            }
            records[index].post_failures = post_failures
                .into_iter()
                .map(|f| format!("{}: {}", f.command, f.reason))
                .collect();

            match outcome {
                StageOutcome::Succeeded {
                    output,
                    actions_run,
                    captured,
                } => {
                    records[index].state = StageState::Succeeded {
                        output,
                        actions_run,
                        started_at,
                        completed_at: Utc::now(),
                    };
                    state.succeeded_stages += 1;
                    self.events.emit(ExecutionEvent::StageSucceeded {
                        stage: stage.name.clone(),
                        captured,
                    });
                }
                StageOutcome::Failed { error, actions_run } => {
                    warn!("Stage {} failed: {}", stage.name, error);
                    records[index].state = StageState::Failed {
                        error: error.clone(),
                        actions_run,
                        started_at,
                        failed_at: Utc::now(),
                    };
                    self.events.emit(ExecutionEvent::StageFailed {
                        stage: stage.name.clone(),
                        error: error.clone(),
                    });
                    self.skip_remaining(records, index + 1, &stage.name);
                    return Some(error);
                }
            }
        }

        None
    }

    fn skip_remaining(&self, records: &mut [StageRecord], from: usize, failed_stage: &str) {
        for record in records.iter_mut().skip(from) {
            let reason = format!("stage '{}' failed", failed_stage);
            record.state = StageState::Skipped {
                reason: reason.clone(),
            };
            self.events.emit(ExecutionEvent::StageSkipped {
                stage: record.name.clone(),
                reason,
            });
        }
    }

    /// Fire exactly one notifier method per notifier. Errors are only logged.
    async fn notify(&self, result: &RunResult) {
        for notifier in &self.notifiers {
            let outcome = match &result.failed_stage {
                None => notifier.on_success(result).await,
                Some(stage) => notifier.on_failure(result, stage).await,
            };
            if let Err(e) = outcome {
                warn!("Notification for run {} failed: {}", result.run_id, e);
            }
        }
    }
}
