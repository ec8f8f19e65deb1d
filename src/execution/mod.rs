//! Run execution engine

pub mod engine;
pub mod events;
pub mod executor;
pub mod notify;
pub mod result;
pub mod workspace;

pub use engine::ExecutionEngine;
pub use events::{EventBus, EventHandler, ExecutionEvent, StageOutput};
pub use executor::{ActionObserver, PostActionFailure, StageExecutor, StageOutcome};
pub use notify::{CommandNotifier, LogNotifier, Notifier, NotifyError};
pub use result::{RunResult, StageRecord};
pub use workspace::RunWorkspace;
