//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::RunStatus;
use crate::core::StageState;
use crate::execution::RunResult;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// One stage line of a stored run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    /// `succeeded`, `failed`, `skipped`, ...
    pub state: String,
    /// Failure reason or skip reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,

    pub pipeline_name: String,

    pub source_ref: String,

    pub status: RunStatus,

    /// First failed stage
    pub failed_stage: Option<String>,

    /// Error kind of the failed stage (e.g. `BuildFailure`)
    pub error_kind: Option<String>,

    pub error: Option<String>,

    /// Captured stage outputs
    pub outputs: BTreeMap<String, String>,

    pub stages: Vec<StageSummary>,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Number of succeeded stages
    pub succeeded_stages: usize,

    /// Total number of stages
    pub total_stages: usize,
}

impl RunSummary {
    /// Progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        self.succeeded_stages as f64 / self.total_stages as f64
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
    by_pipeline: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            by_pipeline: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        let replaced = runs.insert(run.run_id, run.clone()).is_some();

        if !replaced {
            let mut by_pipeline = self.by_pipeline.write().await;
            by_pipeline
                .entry(run.pipeline_name.clone())
                .or_default()
                .push(run.run_id);
        }

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        let mut result: Vec<RunSummary> = by_pipeline
            .get(pipeline_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(result: &RunResult) -> RunSummary {
    let stages = result
        .stages
        .iter()
        .map(|record| StageSummary {
            name: record.name.clone(),
            state: record.state.label().to_string(),
            detail: match &record.state {
                StageState::Failed { error, .. } => Some(error.reason().to_string()),
                StageState::Skipped { reason } => Some(reason.clone()),
                _ => None,
            },
        })
        .collect();

    RunSummary {
        run_id: result.run_id,
        pipeline_name: result.pipeline_name.clone(),
        source_ref: result.source_ref.clone(),
        status: result.status,
        failed_stage: result.failed_stage.clone(),
        error_kind: result.error.as_ref().map(|e| e.kind_name().to_string()),
        error: result.error.as_ref().map(|e| e.to_string()),
        outputs: result.outputs.clone(),
        stages,
        started_at: result.started_at,
        completed_at: Some(result.completed_at),
        succeeded_stages: result.succeeded_stages(),
        total_stages: result.stages.len(),
    }
}

/// Summarize a finished run and save it through `store`
pub async fn record_run(store: &dyn PersistenceBackend, result: &RunResult) -> Result<RunSummary> {
    let summary = create_summary(result);
    store.save_run(&summary).await?;
    Ok(summary)
}
