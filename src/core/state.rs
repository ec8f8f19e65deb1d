//! Execution state models

use crate::core::error::StageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing stages
    Running,
    /// Every stage succeeded
    Succeeded,
    /// A stage failed
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// State of a single stage within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageState {
    /// Stage has not been reached yet
    Pending,
    /// Stage is currently running
    Running { started_at: DateTime<Utc> },
    /// Every action of the stage exited successfully
    Succeeded {
        /// Combined stdout of the stage's actions
        output: String,
        actions_run: usize,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// An action failed; later actions of the stage did not run
    Failed {
        error: StageError,
        actions_run: usize,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Stage never ran because an earlier stage failed
    Skipped { reason: String },
}

impl StageState {
    /// Check if stage is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageState::Succeeded { .. } | StageState::Failed { .. } | StageState::Skipped { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running { .. } => "running",
            StageState::Succeeded { .. } => "succeeded",
            StageState::Failed { .. } => "failed",
            StageState::Skipped { .. } => "skipped",
        }
    }
}

/// Run-level bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Current run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of stages
    pub total_stages: usize,

    /// Number of succeeded stages
    pub succeeded_stages: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            total_stages: 0,
            succeeded_stages: 0,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_stages: usize) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_stages = total_stages;
    }

    /// Mark run as succeeded
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Fraction of stages that succeeded (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        self.succeeded_stages as f64 / self.total_stages as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
