//! Test: Post-actions - best-effort actions that run whatever the stage outcome

use crate::helpers::*;
use stagerun::execution::ExecutionEvent;

#[tokio::test]
async fn test_report_published_when_tests_pass() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    assert_pipeline_succeeded(&result);
    assert!(result.runner.ran("surefire-reports"));
}

#[tokio::test]
async fn test_report_published_when_tests_fail() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = healthy_runner().fail_on("mvn -B test", 1, "Tests run: 4, Failures: 1");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Run Tests");
    assert_stage_failed(&result, "Run Tests", "TestFailure");

    let commands = result.runner.commands();
    let test_index = commands.iter().position(|c| c == "mvn -B test").unwrap();
    assert!(commands[test_index + 1].contains("surefire-reports"));
    assert!(!result.runner.ran("mvn -B clean package"));
}

#[tokio::test]
async fn test_failing_post_action_does_not_change_outcome() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);
    let runner = healthy_runner().fail_on("surefire-reports", 1, "cp: cannot stat 'target/surefire-reports'");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_succeeded(&result);
    assert_stage_succeeded(&result, "Run Tests");
    assert_eq!(result.notifier.calls(), vec!["success"]);

    let record = result.result.stage("Run Tests").unwrap();
    assert_eq!(record.post_failures.len(), 1);
    assert!(record.post_failures[0].contains("cannot stat"));
    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::PostActionFailed { stage, .. } if stage == "Run Tests"
    )));
}

#[tokio::test]
async fn test_post_actions_of_skipped_stages_do_not_run() {
    let yaml = r#"
name: "post-on-skip"
stages:
  - name: "Build"
    kind: build
    steps: ["make"]
  - name: "Run Tests"
    kind: test
    steps: ["make test"]
    post:
      always: ["publish-report"]
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let runner = MockRunner::new().fail_on("make", 2, "");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Build");
    assert_eq!(result.runner.commands(), vec!["make"]);
}

#[tokio::test]
async fn test_every_post_action_is_attempted() {
    let yaml = r#"
name: "many-posts"
stages:
  - name: "Run Tests"
    kind: test
    steps: ["make test"]
    post:
      always:
        - "collect-junit"
        - "collect-coverage"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let runner = MockRunner::new()
        .fail_on("make test", 1, "")
        .fail_on("collect-junit", 1, "");

    let result = run_pipeline_with_mock(&pipeline, runner).await;

    assert_pipeline_failed_at(&result, "Run Tests");
    assert_eq!(
        result.runner.commands(),
        vec!["make test", "collect-junit", "collect-coverage"]
    );
}
