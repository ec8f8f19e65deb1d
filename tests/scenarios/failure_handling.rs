//! Test: Failure Handling - the first failure short-circuits the run

use crate::helpers::*;
use stagerun::core::StageState;
use stagerun::execution::ExecutionEvent;

#[tokio::test]
async fn test_build_failure_stops_later_stages() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = healthy_runner().fail_on("mvn -B clean package", 1, "[ERROR] COMPILATION ERROR");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Build");
    assert_stage_failed(&result, "Build", "BuildFailure");
    assert_execution_order(&result, &["Clone", "Run Tests", "Build"]);
    assert_eq!(
        result.skipped_stages(),
        vec!["Containerize", "Publish", "Deploy"]
    );
    assert!(!result.runner.ran("docker"));
}

#[tokio::test]
async fn test_on_failure_names_first_failed_stage_once() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = healthy_runner().fail_on("mvn -B clean package", 1, "");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_eq!(result.notifier.calls(), vec!["failure:Build"]);
}

#[tokio::test]
async fn test_error_kind_follows_stage_kind() {
    let cases = [
        ("git clone", "Clone", "SourceUnavailable"),
        ("mvn -B test", "Run Tests", "TestFailure"),
        ("docker build", "Containerize", "ContainerBuildFailure"),
        ("docker push", "Publish", "PublishFailure"),
        ("docker run", "Deploy", "DeployFailure"),
    ];

    for (marker, stage, kind) in cases {
        let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
        let runner = MockRunner::new().fail_on(marker, 1, "error");

        let result = run_pipeline_with_mock(&pipeline, runner).await;

        assert_pipeline_failed_at(&result, stage);
        assert_stage_failed(&result, stage, kind);
        assert_eq!(result.result.error.as_ref().unwrap().kind_name(), kind);
    }
}

#[tokio::test]
async fn test_unknown_branch_is_source_unavailable() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = MockRunner::new().fail_on(
        "git clone",
        128,
        "warning: Could not find remote branch nope to clone.\nfatal: Remote branch nope not found in upstream origin",
    );

    let result = run_pipeline_with(&pipeline, runner, |b| b.source_ref("nope")).await;

    assert_pipeline_failed_at(&result, "Clone");
    let error = result.result.error.as_ref().unwrap();
    assert_eq!(error.kind_name(), "SourceUnavailable");
    assert!(error.reason().contains("exited with code 128"));
    assert!(error.reason().contains("Remote branch nope not found"));
    assert_eq!(result.skipped_stages().len(), 5);
}

#[tokio::test]
async fn test_port_conflict_surfaces_as_deploy_failure() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = MockRunner::new().fail_on(
        "docker run",
        125,
        "docker: Error response from daemon: Bind for 0.0.0.0:8080 failed: port is already allocated.",
    );

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Deploy");
    assert_stage_failed(&result, "Deploy", "DeployFailure");
    assert!(result
        .result
        .error
        .as_ref()
        .unwrap()
        .reason()
        .contains("port is already allocated"));
    assert!(!result.result.outputs.contains_key("instance_id"));
}

#[tokio::test]
async fn test_timeout_fails_stage_with_its_kind() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = MockRunner::new().time_out_on("mvn -B test", 600);

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Run Tests");
    assert_stage_failed(&result, "Run Tests", "TestFailure");
    assert!(result
        .result
        .error
        .as_ref()
        .unwrap()
        .reason()
        .contains("timed out after 600 seconds"));
}

#[tokio::test]
async fn test_failed_stage_stops_its_remaining_actions() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = MockRunner::new().fail_on("docker login", 1, "unauthorized: incorrect username or password");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Publish");
    assert!(!result.runner.ran("docker push"));
    match result.get_stage_state("Publish").unwrap() {
        StageState::Failed { actions_run, .. } => assert_eq!(*actions_run, 1),
        other => panic!("unexpected state {:?}", other),
    }
}

#[tokio::test]
async fn test_skipped_stages_emit_events() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = MockRunner::new().fail_on("docker build", 1, "");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    let skipped: Vec<&str> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StageSkipped { stage, reason } => {
                assert_eq!(reason, "stage 'Containerize' failed");
                Some(stage.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["Publish", "Deploy"]);

    match result.events.last() {
        Some(ExecutionEvent::RunCompleted { failed_stage, .. }) => {
            assert_eq!(failed_stage.as_deref(), Some("Containerize"));
        }
        other => panic!("last event should be RunCompleted, got {:?}", other),
    }
}
