//! Test: Variable Substitution - placeholders, overrides and captures

use crate::helpers::*;
use stagerun::core::config::PipelineConfig;
use stagerun::core::error::ConfigError;

#[tokio::test]
async fn test_override_replaces_image() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with(&pipeline, healthy_runner(), |b| {
        b.variable("image", "registry.local/app:1.2.3")
    })
    .await;

    assert_pipeline_succeeded(&result);
    assert!(result
        .runner
        .commands()
        .contains(&"docker build -t registry.local/app:1.2.3 .".to_string()));
}

#[tokio::test]
async fn test_ports_can_be_overridden() {
    let pipeline = pipeline_from_yaml(DEMO_PIPELINE);

    let result = run_pipeline_with(&pipeline, healthy_runner(), |b| b.variable("host_port", "9090")).await;

    assert!(result
        .runner
        .commands()
        .last()
        .unwrap()
        .starts_with("docker run -d -p 9090:8080 "));
}

#[tokio::test]
async fn test_unresolved_placeholder_fails_with_stage_kind() {
    // Skip validation so the undefined variable reaches the engine
    let yaml = r#"
name: "unresolved"
stages:
  - name: "Build"
    kind: build
    steps: ["mvn -B package -Drevision={{ revision }}"]
"#;
    let pipeline = PipelineConfig::parse(yaml).unwrap().to_pipeline();

    let result = run_pipeline_with_mock(&pipeline, MockRunner::new()).await;

    assert_pipeline_failed_at(&result, "Build");
    assert_stage_failed(&result, "Build", "BuildFailure");
    assert!(result.result.error.as_ref().unwrap().reason().contains("'revision'"));
    assert!(result.runner.commands().is_empty());
}

#[test]
fn test_validation_rejects_unknown_variable() {
    let yaml = r#"
name: "unknown"
stages:
  - name: "Containerize"
    kind: containerize
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingVariable { ref stage, ref variable } if stage == "Containerize" && variable == "image"
    ));
}

#[test]
fn test_validation_accepts_capture_from_earlier_stage() {
    let yaml = r#"
name: "captured"
variables:
  image: "acme/app:1"
stages:
  - name: "Deploy"
    kind: deploy
  - name: "Smoke"
    steps: ["docker logs {{ instance_id }}"]
"#;
    assert!(PipelineConfig::from_yaml(yaml).is_ok());

    let reversed = r#"
name: "captured"
variables:
  image: "acme/app:1"
stages:
  - name: "Smoke"
    steps: ["docker logs {{ instance_id }}"]
  - name: "Deploy"
    kind: deploy
"#;
    assert!(PipelineConfig::from_yaml(reversed).is_err());
}

#[tokio::test]
async fn test_capture_is_visible_to_later_stages() {
    let yaml = r#"
name: "captured"
variables:
  image: "acme/app:1"
stages:
  - name: "Deploy"
    kind: deploy
  - name: "Smoke"
    steps: ["docker logs {{ instance_id }}"]
"#;
    let pipeline = pipeline_from_yaml(yaml);

    let result = run_pipeline_with_mock(&pipeline, healthy_runner()).await;

    assert_pipeline_succeeded(&result);
    let calls = result.runner.calls();
    assert_eq!(calls[1].command, "docker logs 3f2a9c1d8e7b");
    assert_eq!(calls[1].env["INSTANCE_ID"], "3f2a9c1d8e7b");
}

#[test]
fn test_sample_pipeline_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/pipeline.yaml");
    let config = PipelineConfig::from_file(path).unwrap();

    let pipeline = config.to_pipeline();
    let names: Vec<&str> = pipeline.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ALL_STAGES);
    assert!(!pipeline.notifications.is_empty());
}
