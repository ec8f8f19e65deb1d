//! Test utility functions for stagerun scenarios

use async_trait::async_trait;
use stagerun::core::config::PipelineConfig;
use stagerun::core::{Pipeline, RunConfig, RunConfigBuilder, RunStatus, StageState};
use stagerun::execution::{ExecutionEngine, ExecutionEvent, Notifier, NotifyError, RunResult};
use stagerun::shell::{
    CommandOutput, CommandRequest, CommandRunner, OutputCallback, OutputStream, ShellError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted reply for commands containing a marker
#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    Timeout(u64),
}

/// Mock runner that answers every command from a script
///
/// Commands matching no rule succeed with empty output. Every command is
/// recorded (with its cwd and environment) in the order it was run.
#[derive(Default)]
pub struct MockRunner {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `marker` exit with `exit_code` and print `stderr`
    pub fn fail_on(mut self, marker: &str, exit_code: i32, stderr: &str) -> Self {
        self.rules.push((
            marker.to_string(),
            Reply::Output(CommandOutput::failure(exit_code, stderr)),
        ));
        self
    }

    /// Commands containing `marker` succeed and print `stdout`
    pub fn respond(mut self, marker: &str, stdout: &str) -> Self {
        self.rules
            .push((marker.to_string(), Reply::Output(CommandOutput::success(stdout))));
        self
    }

    /// Commands containing `marker` time out
    pub fn time_out_on(mut self, marker: &str, secs: u64) -> Self {
        self.rules.push((marker.to_string(), Reply::Timeout(secs)));
        self
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    /// Whether any recorded command contains `marker`
    pub fn ran(&self, marker: &str) -> bool {
        self.commands().iter().any(|c| c.contains(marker))
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, ShellError> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = self
            .rules
            .iter()
            .find(|(marker, _)| request.command.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::Output(CommandOutput::success("")));

        match reply {
            Reply::Output(output) => {
                if let Some(cb) = callback {
                    for line in output.stdout.lines() {
                        cb.on_line(OutputStream::Stdout, line);
                    }
                    for line in output.stderr.lines() {
                        cb.on_line(OutputStream::Stderr, line);
                    }
                }
                Ok(output)
            }
            Reply::Timeout(secs) => Err(ShellError::Timeout(Duration::from_secs(secs))),
        }
    }
}

/// Notifier that records which callback fired
#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn on_success(&self, _result: &RunResult) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push("success".to_string());
        Ok(())
    }

    async fn on_failure(&self, _result: &RunResult, failed_stage: &str) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("failure:{}", failed_stage));
        Ok(())
    }
}

/// Test result from running a pipeline
pub struct PipelineTestResult {
    pub result: RunResult,
    pub runner: Arc<MockRunner>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Vec<ExecutionEvent>,
    pub workspace_root: tempfile::TempDir,
}

impl PipelineTestResult {
    pub fn is_success(&self) -> bool {
        self.result.status == RunStatus::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.result.status == RunStatus::Failed
    }

    pub fn get_stage_state(&self, stage: &str) -> Option<&StageState> {
        self.result.stage(stage).map(|s| &s.state)
    }

    /// Names of stages that were reported as skipped
    pub fn skipped_stages(&self) -> Vec<String> {
        self.result
            .stages
            .iter()
            .filter(|s| matches!(s.state, StageState::Skipped { .. }))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn summary(&self) -> String {
        let status = match self.result.status {
            RunStatus::Succeeded => "✅ Succeeded",
            RunStatus::Failed => "❌ Failed",
            _ => "❓ Unknown",
        };
        format!(
            "{} - executed {:?}, failed {:?}, error {:?}",
            status,
            self.result.executed_stages(),
            self.result.failed_stage,
            self.result.error
        )
    }
}

/// Parse a pipeline from YAML string
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    let config = PipelineConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse pipeline YAML: {}", e));
    config.to_pipeline()
}

/// Environment lookup used by every scenario
pub fn test_env(name: &str) -> Option<String> {
    match name {
        "REGISTRY_PASSWORD" => Some("hunter2".to_string()),
        _ => None,
    }
}

/// Run a pipeline with a mock runner in a scratch workspace root
pub async fn run_pipeline_with_mock(pipeline: &Pipeline, runner: MockRunner) -> PipelineTestResult {
    run_pipeline_with(pipeline, runner, |builder| builder).await
}

/// Like [`run_pipeline_with_mock`], letting the test adjust the run config
pub async fn run_pipeline_with<F>(pipeline: &Pipeline, runner: MockRunner, configure: F) -> PipelineTestResult
where
    F: FnOnce(RunConfigBuilder<'_>) -> RunConfigBuilder<'_>,
{
    let workspace_root = tempfile::tempdir().unwrap();
    let builder = RunConfig::builder(pipeline)
        .workspace_root(workspace_root.path())
        .env_lookup(test_env);
    let config = configure(builder)
        .build()
        .unwrap_or_else(|e| panic!("Failed to build run config: {}", e));

    let runner = Arc::new(runner);
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = ExecutionEngine::new(runner.clone()).with_notifier(notifier.clone());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let result = engine.run(pipeline, &config).await;
    let events = events.lock().unwrap().clone();

    PipelineTestResult {
        result,
        runner,
        notifier,
        events,
        workspace_root,
    }
}

/// Assert a stage succeeded
pub fn assert_stage_succeeded(result: &PipelineTestResult, stage: &str) {
    let state = result
        .get_stage_state(stage)
        .unwrap_or_else(|| panic!("Stage '{}' not found in result", stage));
    assert!(
        matches!(state, StageState::Succeeded { .. }),
        "Stage '{}' should have succeeded, but was in state: {:?}",
        stage,
        state
    );
}

/// Assert a stage failed with the given error kind
pub fn assert_stage_failed(result: &PipelineTestResult, stage: &str, expected_kind: &str) {
    let state = result
        .get_stage_state(stage)
        .unwrap_or_else(|| panic!("Stage '{}' not found in result", stage));
    match state {
        StageState::Failed { error, .. } => assert_eq!(
            error.kind_name(),
            expected_kind,
            "Stage '{}' failed with {} instead of {}",
            stage,
            error.kind_name(),
            expected_kind
        ),
        other => panic!("Stage '{}' should have failed, but was in state: {:?}", stage, other),
    }
}

/// Assert run succeeded
pub fn assert_pipeline_succeeded(result: &PipelineTestResult) {
    assert!(
        result.is_success(),
        "Run should have succeeded, but was: {}",
        result.summary()
    );
}

/// Assert run failed at the given stage
pub fn assert_pipeline_failed_at(result: &PipelineTestResult, stage: &str) {
    assert!(
        result.is_failed(),
        "Run should have failed, but was: {}",
        result.summary()
    );
    assert_eq!(result.result.failed_stage.as_deref(), Some(stage));
}

/// Assert exactly these stages ran, in this order
pub fn assert_execution_order(result: &PipelineTestResult, expected_order: &[&str]) {
    let actual = result.result.executed_stages();
    assert_eq!(
        actual, expected_order,
        "Expected execution order: {:?}\nActual: {:?}",
        expected_order, actual
    );
}

/// The six-stage build/deploy pipeline of the demo service
pub const DEMO_PIPELINE: &str = r#"
name: "devops-java-app"
source:
  repository: "https://github.com/acme/devops-java-app.git"
  branch: "main"
variables:
  image: "docker.io/acme/devops-java-app:latest"
registry:
  url: "docker.io"
  username: "acme"
stages:
  - name: "Clone"
    kind: clone
  - name: "Run Tests"
    kind: test
    steps:
      - "mvn -B test"
    post:
      always:
        - "cp -r target/surefire-reports {{ workspace }}/reports"
  - name: "Build"
    kind: build
    steps:
      - "mvn -B clean package -DskipTests"
  - name: "Containerize"
    kind: containerize
  - name: "Publish"
    kind: publish
  - name: "Deploy"
    kind: deploy
"#;

pub const ALL_STAGES: &[&str] = &["Clone", "Run Tests", "Build", "Containerize", "Publish", "Deploy"];

/// Runner for a healthy world: deploy prints a container id
pub fn healthy_runner() -> MockRunner {
    MockRunner::new().respond("docker run", "Unable to find image locally\n3f2a9c1d8e7b\n")
}
