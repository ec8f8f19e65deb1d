//! Events emitted while a run is in progress

use crate::{
    core::{RunStatus, StageError},
    shell::{OutputCallback, OutputStream},
};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        source_ref: String,
        total_stages: usize,
    },
    StageStarted {
        stage: String,
        index: usize,
    },
    ActionStarted {
        stage: String,
        index: usize,
        command: String,
    },
    ActionOutput {
        stage: String,
        stream: OutputStream,
        line: String,
    },
    StageSucceeded {
        stage: String,
        captured: Option<(String, String)>,
    },
    StageFailed {
        stage: String,
        error: StageError,
    },
    StageSkipped {
        stage: String,
        reason: String,
    },
    PostActionFailed {
        stage: String,
        command: String,
        reason: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
        failed_stage: Option<String>,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of events to every registered handler
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: EventHandler) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(handler);
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Output callback that turns each line of a stage's actions into an
    /// [`ExecutionEvent::ActionOutput`]
    pub fn stage_output<'a>(&'a self, stage: &'a str) -> StageOutput<'a> {
        StageOutput { bus: self, stage }
    }
}

/// Forwards command output lines for one stage to the [`EventBus`]
pub struct StageOutput<'a> {
    bus: &'a EventBus,
    stage: &'a str,
}

impl OutputCallback for StageOutput<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        self.bus.emit(ExecutionEvent::ActionOutput {
            stage: self.stage.to_string(),
            stream,
            line: line.to_string(),
        });
    }
}
