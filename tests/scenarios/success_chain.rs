//! Test: Success Chain - every stage runs in declared order

use crate::helpers::*;
use stagerun::execution::ExecutionEvent;

#[tokio::test]
async fn test_all_stages_succeed() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    assert_pipeline_succeeded(&result);
    assert_execution_order(&result, ALL_STAGES);
    for stage in ALL_STAGES {
        assert_stage_succeeded(&result, stage);
    }
    assert!(result.skipped_stages().is_empty());
    assert!(result.result.error.is_none());
    assert!(result.result.failed_stage.is_none());
}

#[tokio::test]
async fn test_on_success_fires_exactly_once() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    assert_eq!(result.notifier.calls(), vec!["success"]);
}

#[tokio::test]
async fn test_default_actions_are_rendered() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    let commands = result.runner.commands();
    assert_eq!(
        commands[0],
        "git clone --depth 1 --branch main https://github.com/acme/devops-java-app.git ."
    );
    assert_eq!(commands[1], "mvn -B test");
    assert!(commands[2].starts_with("cp -r target/surefire-reports "));
    assert_eq!(commands[3], "mvn -B clean package -DskipTests");
    assert_eq!(commands[4], "docker build -t docker.io/acme/devops-java-app:latest .");
    assert!(commands[5].contains("docker login docker.io -u acme --password-stdin"));
    assert_eq!(commands[6], "docker push docker.io/acme/devops-java-app:latest");
    assert_eq!(
        commands[7],
        "docker run -d -p 8080:8080 docker.io/acme/devops-java-app:latest"
    );
    assert_eq!(commands.len(), 8);
}

#[tokio::test]
async fn test_registry_password_is_exported_not_rendered() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    let login = result
        .runner
        .calls()
        .into_iter()
        .find(|c| c.command.contains("docker login"))
        .expect("login command should run");
    assert!(!login.command.contains("hunter2"));
    assert_eq!(login.env["REGISTRY_PASSWORD"], "hunter2");
}

#[tokio::test]
async fn test_deploy_captures_instance_id() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    assert_eq!(result.result.outputs["instance_id"], "3f2a9c1d8e7b");
    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StageSucceeded { stage, captured: Some((key, value)) }
            if stage == "Deploy" && key == "instance_id" && value == "3f2a9c1d8e7b"
    )));
}

#[tokio::test]
async fn test_source_ref_selects_branch() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result =
        run_pipeline_with(&pipeline, healthy_runner(), |b| b.source_ref("release/2.0")).await;

    assert_pipeline_succeeded(&result);
    assert!(result.runner.commands()[0].contains("--branch release/2.0 "));
}

#[tokio::test]
async fn test_every_action_runs_in_the_run_workspace() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    let calls = result.runner.calls();
    let cwd = calls[0].cwd.clone();
    assert!(cwd.starts_with(result.workspace_root.path()));
    assert!(cwd
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with(&result.result.run_id.to_string()));
    assert!(calls.iter().all(|c| c.cwd == cwd));
    assert_eq!(calls[1].env["SOURCE_REF"], "main");
    assert_eq!(calls[1].env["IMAGE"], "docker.io/acme/devops-java-app:latest");
}

#[tokio::test]
async fn test_hello_service_pipeline_builds_demo_dockerfile() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/hello-service.yaml");
    let pipeline = pipeline_from_yaml(&std::fs::read_to_string(path).unwrap());

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    assert_pipeline_succeeded(&result);
    assert_execution_order(&result, ALL_STAGES);
    let commands = result.runner.commands();
    assert!(commands.contains(
        &"docker build -f demos/Dockerfile -t docker.io/acme/stagerun-hello:latest .".to_string()
    ));
    assert!(commands.contains(&format!(
        "cp test-report.txt /tmp/hello-service-{}.txt",
        result.result.run_id
    )));
}
