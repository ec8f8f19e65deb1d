//! Shell runner configuration

/// Configuration for [`ShellRunner`](crate::shell::ShellRunner)
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell used to interpret actions. Defaults to `sh` on PATH.
    pub shell: Option<String>,

    /// Start every process with an empty environment (PATH and HOME are kept)
    pub clear_env: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: None,
            clear_env: false,
        }
    }
}

impl ShellConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_clear_env(mut self, clear_env: bool) -> Self {
        self.clear_env = clear_env;
        self
    }
}
