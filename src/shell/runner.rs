//! Subprocess runner - executes actions through `sh -c`

use crate::shell::output::format_timeout;
use crate::shell::{
    CommandOutput, CommandRequest, CommandRunner, OutputCallback, OutputStream, ShellConfig,
    ShellError,
};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs commands as child processes of a POSIX shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    clear_env: bool,
}

impl ShellRunner {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            shell: config.shell.unwrap_or_else(|| "sh".to_string()),
            clear_env: config.clear_env,
        }
    }

    /// Get the shell executable path
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

/// How long output is still read after the shell exits. Background
/// processes started by an action inherit its pipes and may never close them.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Read a pipe to the end, forwarding each line to the callback
async fn drain<R>(
    reader: Option<R>,
    stream: OutputStream,
    callback: Option<&dyn OutputCallback>,
    collected: &mut String,
) -> Result<(), std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(cb) = callback {
            cb.on_line(stream, &line);
        }
        collected.push_str(&line);
        collected.push('\n');
    }

    Ok(())
}

/// Kills the child's whole process group when dropped, unless disarmed
///
/// Armed while the shell is running, so a timeout or a cancelled run also
/// takes down subshells and pipelines the action started.
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            debug!("Killing process group {}", pgid);
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    // SAFETY: killpg only sends a signal; a group that is already gone yields ESRCH
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}

#[async_trait]
impl CommandRunner for ShellRunner {
    /// Spawn `<shell> -c <command>` and wait for it to exit
    ///
    /// A non-zero exit is not an error here: it comes back as a
    /// [`CommandOutput`] and the caller decides what it means. Errors are
    /// reserved for processes that could not be spawned or did not finish in time.
    /// Processes the action leaves running in the background survive a
    /// normal exit; on timeout the whole process group is killed.
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, ShellError> {
        debug!("Spawning {} -c {:?} in {}", self.shell, request.command, request.cwd.display());

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&request.command)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        if self.clear_env {
            command.env_clear();
            for key in ["PATH", "HOME"] {
                if let Ok(value) = std::env::var(key) {
                    command.env(key, value);
                }
            }
        }
        command.envs(&request.env);

        let mut child = command.spawn().map_err(|source| ShellError::Spawn {
            program: self.shell.clone(),
            source,
        })?;
        let mut group = ProcessGroupGuard::new(&child);

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut stdout = String::new();
        let mut stderr = String::new();

        let collect = async {
            let streams = async {
                tokio::try_join!(
                    drain(stdout_pipe, OutputStream::Stdout, callback, &mut stdout),
                    drain(stderr_pipe, OutputStream::Stderr, callback, &mut stderr),
                )
            };
            tokio::pin!(streams);

            let mut streams_done = false;
            let status = loop {
                tokio::select! {
                    drained = &mut streams, if !streams_done => {
                        drained?;
                        streams_done = true;
                    }
                    status = child.wait() => break status?,
                }
            };
            group.disarm();

            if !streams_done {
                match timeout(OUTPUT_GRACE, &mut streams).await {
                    Ok(drained) => {
                        drained?;
                    }
                    Err(_) => debug!("Output still open after exit, a background process holds it"),
                }
            }
            Ok::<_, std::io::Error>(status)
        };

        // On timeout the guard and kill_on_drop take the processes down
        let status = timeout(request.timeout, collect)
            .await
            .map_err(|_| {
                warn!(
                    "Command timed out after {}: {}",
                    format_timeout(&request.timeout),
                    request.command
                );
                ShellError::Timeout(request.timeout)
            })??;

        let exit_code = status.code().unwrap_or(-1);
        debug!("Command exited with code {} ({} bytes of stdout)", exit_code, stdout.len());

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
