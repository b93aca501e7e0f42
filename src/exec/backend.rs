// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! States never spawn processes directly; they go through the context's
//! `ProcessBackend`. This makes it easy to swap in a fake backend in tests
//! while keeping the production implementation in [`process`].
//!
//! [`process`]: crate::exec::process

use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{PrimerError, Result};

use super::process::{reexec_process, run_command};

/// Default upper bound for a single command (package installs can be slow).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// A command to run: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Value of an extra environment variable set on this command.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// File name of the program, for log fields.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into `SubprocessFailure`.
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(PrimerError::SubprocessFailure {
                command: spec.to_string(),
                code: self.code,
            })
        }
    }
}

/// How states run external tools.
///
/// Production code uses [`RealProcessBackend`]; tests provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessBackend {
    /// Run a command to completion and capture its output.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Replace the current process image with `spec`.
    ///
    /// Only returns on failure.
    fn reexec(&self, spec: &CommandSpec) -> Result<Infallible>;
}

/// Real backend used in production.
///
/// The engine itself is synchronous; this backend owns a current-thread
/// Tokio runtime and blocks on each command while its output streams are
/// drained concurrently.
pub struct RealProcessBackend {
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
}

impl RealProcessBackend {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, timeout })
    }
}

impl fmt::Debug for RealProcessBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealProcessBackend")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProcessBackend for RealProcessBackend {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.runtime.block_on(run_command(spec, self.timeout))?;
        Ok(output)
    }

    fn reexec(&self, spec: &CommandSpec) -> Result<Infallible> {
        reexec_process(spec)
    }
}

/// Backend for unit tests that must never touch real processes.
#[cfg(test)]
pub(crate) struct RefusingBackend;

#[cfg(test)]
impl ProcessBackend for RefusingBackend {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        Err(PrimerError::Other(anyhow::anyhow!(
            "unexpected command in unit test: {spec}"
        )))
    }

    fn reexec(&self, spec: &CommandSpec) -> Result<Infallible> {
        Err(PrimerError::Other(anyhow::anyhow!(
            "unexpected re-exec in unit test: {spec}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("/usr/bin/python3")
            .args(["-m", "venv"])
            .path_arg(Path::new("venv"));
        assert_eq!(spec.to_string(), "/usr/bin/python3 -m venv venv");
        assert_eq!(spec.program_name(), "python3");
    }

    #[test]
    fn env_value_prefers_last_entry() {
        let spec = CommandSpec::new("x").env("A", "1").env("A", "2");
        assert_eq!(spec.env_value("A"), Some("2"));
        assert_eq!(spec.env_value("B"), None);
    }

    #[test]
    fn non_zero_exit_is_subprocess_failure() {
        let spec = CommandSpec::new("false");
        let output = CommandOutput {
            code: Some(3),
            ..CommandOutput::default()
        };
        assert!(matches!(
            output.ensure_success(&spec),
            Err(PrimerError::SubprocessFailure { code: Some(3), .. })
        ));
    }
}
