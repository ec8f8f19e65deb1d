//! Line-by-line output streaming for running commands
//!
//! [`CommandRunner::run`](crate::shell::CommandRunner::run) accepts an optional
//! [`OutputCallback`] that sees every stdout and stderr line as soon as the
//! process writes it. The full output is still returned in the
//! [`CommandOutput`](crate::shell::CommandOutput) once the process exits.
//!
//! # Example
//!
//! ```no_run
//! use stagerun::shell::{CommandRequest, CommandRunner, OutputCallback, OutputStream, ShellRunner};
//!
//! struct LivePrinter;
//!
//! impl OutputCallback for LivePrinter {
//!     fn on_line(&self, stream: OutputStream, line: &str) {
//!         match stream {
//!             OutputStream::Stdout => println!("{}", line),
//!             OutputStream::Stderr => eprintln!("{}", line),
//!         }
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ShellRunner::default();
//! let request = CommandRequest::new("mvn test", ".");
//! let output = runner.run(&request, Some(&LivePrinter)).await?;
//! println!("exit code {}", output.exit_code);
//! # Ok(())
//! # }
//! ```

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Callback for processing output lines as they arrive
///
/// This trait is object-safe and can be used as `&dyn OutputCallback`.
pub trait OutputCallback: Send + Sync {
    /// Called once per line, without the trailing newline
    fn on_line(&self, stream: OutputStream, line: &str);
}

/// Callback that ignores every line
#[derive(Debug, Clone, Default)]
pub struct NoopCallback;

impl OutputCallback for NoopCallback {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}
