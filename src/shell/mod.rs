//! Command execution for stage actions

pub mod config;
pub mod output;
pub mod runner;
pub mod streaming;

use async_trait::async_trait;
pub use config::ShellConfig;
pub use output::{CommandOutput, CommandRequest, ShellError};
pub use runner::ShellRunner;
pub use streaming::{NoopCallback, OutputCallback, OutputStream};

/// Trait for running a single action - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, streaming output lines to the callback
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, ShellError>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, ShellError> {
        (**self).run(request, callback).await
    }
}
