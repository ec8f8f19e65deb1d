//! Stage and configuration error types

use crate::core::stage::StageKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a stage failed. Every variant names the failing stage.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageError {
    #[error("source unavailable in stage '{stage}': {reason}")]
    SourceUnavailable { stage: String, reason: String },

    #[error("tests failed in stage '{stage}': {reason}")]
    TestFailure { stage: String, reason: String },

    #[error("build failed in stage '{stage}': {reason}")]
    BuildFailure { stage: String, reason: String },

    #[error("container build failed in stage '{stage}': {reason}")]
    ContainerBuildFailure { stage: String, reason: String },

    #[error("publish failed in stage '{stage}': {reason}")]
    PublishFailure { stage: String, reason: String },

    #[error("deploy failed in stage '{stage}': {reason}")]
    DeployFailure { stage: String, reason: String },

    #[error("command failed in stage '{stage}': {reason}")]
    CommandFailure { stage: String, reason: String },
}

impl StageError {
    /// Build the error variant that corresponds to a stage kind
    pub fn for_kind(kind: StageKind, stage: impl Into<String>, reason: impl Into<String>) -> Self {
        let stage = stage.into();
        let reason = reason.into();
        match kind {
            StageKind::Clone => StageError::SourceUnavailable { stage, reason },
            StageKind::Test => StageError::TestFailure { stage, reason },
            StageKind::Build => StageError::BuildFailure { stage, reason },
            StageKind::Containerize => StageError::ContainerBuildFailure { stage, reason },
            StageKind::Publish => StageError::PublishFailure { stage, reason },
            StageKind::Deploy => StageError::DeployFailure { stage, reason },
            StageKind::Custom => StageError::CommandFailure { stage, reason },
        }
    }

    /// Name of the stage that failed
    pub fn stage(&self) -> &str {
        match self {
            StageError::SourceUnavailable { stage, .. }
            | StageError::TestFailure { stage, .. }
            | StageError::BuildFailure { stage, .. }
            | StageError::ContainerBuildFailure { stage, .. }
            | StageError::PublishFailure { stage, .. }
            | StageError::DeployFailure { stage, .. }
            | StageError::CommandFailure { stage, .. } => stage,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            StageError::SourceUnavailable { reason, .. }
            | StageError::TestFailure { reason, .. }
            | StageError::BuildFailure { reason, .. }
            | StageError::ContainerBuildFailure { reason, .. }
            | StageError::PublishFailure { reason, .. }
            | StageError::DeployFailure { reason, .. }
            | StageError::CommandFailure { reason, .. } => reason,
        }
    }

    /// Short machine-friendly kind name (e.g. `BuildFailure`)
    pub fn kind_name(&self) -> &'static str {
        match self {
            StageError::SourceUnavailable { .. } => "SourceUnavailable",
            StageError::TestFailure { .. } => "TestFailure",
            StageError::BuildFailure { .. } => "BuildFailure",
            StageError::ContainerBuildFailure { .. } => "ContainerBuildFailure",
            StageError::PublishFailure { .. } => "PublishFailure",
            StageError::DeployFailure { .. } => "DeployFailure",
            StageError::CommandFailure { .. } => "CommandFailure",
        }
    }
}

/// Errors raised while loading or validating a pipeline definition
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("pipeline '{0}' has no stages")]
    NoStages(String),

    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("stage '{0}' has no steps and its kind has no default actions")]
    EmptyStage(String),

    #[error("stage '{stage}' requires variable '{variable}' but the pipeline does not define it")]
    MissingVariable { stage: String, variable: String },

    #[error("stage '{0}' publishes an image but no registry is configured")]
    MissingRegistry(String),

    #[error("registry credential variable '{0}' is not set in the environment")]
    MissingCredential(String),

    #[error("variable '{variable}' reads environment variable '{env}', which is not set")]
    UnsetEnvironment { variable: String, env: String },
}
