//! stagerun - a sequential build/test/deploy pipeline runner

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod service;
pub mod shell;

// Re-export commonly used types
pub use core::{Pipeline, RunConfig, RunStatus, Stage, StageError, StageKind, StageState};
pub use execution::{ExecutionEngine, ExecutionEvent, Notifier, RunResult};
pub use shell::{CommandRunner, ShellRunner};
