//! Outcome of a finished run

use crate::core::{RunStatus, StageError, StageKind, StageState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Final state of one stage, including any post-action failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub kind: StageKind,
    pub state: StageState,

    /// Post-actions that failed (`command: reason`). Never affects the stage outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_failures: Vec<String>,
}

impl StageRecord {
    pub fn pending(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            kind,
            state: StageState::Pending,
            post_failures: Vec::new(),
        }
    }

    /// Whether the stage's actions were started at all
    pub fn was_executed(&self) -> bool {
        matches!(
            self.state,
            StageState::Running { .. } | StageState::Succeeded { .. } | StageState::Failed { .. }
        )
    }
}

/// Result of [`ExecutionEngine::run`](crate::execution::ExecutionEngine::run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub source_ref: String,
    pub status: RunStatus,

    /// Every stage of the pipeline, in declared order
    pub stages: Vec<StageRecord>,

    /// First stage that failed, if any
    pub failed_stage: Option<String>,

    pub error: Option<StageError>,

    /// Values captured by stages (e.g. `instance_id`)
    pub outputs: BTreeMap<String, String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Names of the stages whose actions were started, in order
    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn succeeded_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| matches!(s.state, StageState::Succeeded { .. }))
            .count()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}
