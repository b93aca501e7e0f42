// src/exec/process.rs

//! Individual process runner.

use std::convert::Infallible;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::PrimerError;

use super::backend::{CommandOutput, CommandSpec};

/// How long output readers may outlive the process they read from.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Run a single command, logging its stdout/stderr line by line at debug
/// level while capturing both.
///
/// The child is killed if it outlives `timeout`.
pub async fn run_command(spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
    info!(cmd = %spec, "running command");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process `{spec}`"))?;

    let program = spec.program_name();
    let stdout = tokio::spawn(drain_lines(child.stdout.take(), program.clone(), "stdout"));
    let stderr = tokio::spawn(drain_lines(child.stderr.take(), program, "stderr"));

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_elapsed) => {
            warn!(cmd = %spec, ?timeout, "command timed out; killing process");
            if let Err(e) = child.kill().await {
                warn!(cmd = %spec, error = %e, "failed to kill timed out process");
            }
            Ok(None)
        }
    };

    // A grandchild can hold the pipes open after the child is gone.
    let stdout = finish_drain(stdout, spec).await;
    let stderr = finish_drain(stderr, spec).await;

    let status = status.with_context(|| format!("waiting for process `{spec}`"))?;
    let Some(status) = status else {
        bail!("command `{spec}` timed out after {timeout:?}");
    };

    info!(
        cmd = %spec,
        exit_code = status.code(),
        success = status.success(),
        "command exited"
    );

    Ok(CommandOutput {
        code: status.code(),
        stdout,
        stderr,
    })
}

/// Read a child stream to the end, logging each line.
async fn drain_lines<R>(reader: Option<R>, program: String, stream: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };

    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(program = %program, stream, "{}", line);
        collected.push_str(&line);
        collected.push('\n');
    }

    collected
}

/// Collect a drain task, giving up after [`DRAIN_GRACE`].
async fn finish_drain(mut task: JoinHandle<String>, spec: &CommandSpec) -> String {
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(Ok(collected)) => collected,
        Ok(Err(e)) => {
            warn!(cmd = %spec, error = %e, "output reader failed");
            String::new()
        }
        Err(_elapsed) => {
            warn!(cmd = %spec, "output still open after exit; dropping the rest");
            task.abort();
            String::new()
        }
    }
}

fn std_command(spec: &CommandSpec) -> std::process::Command {
    let mut cmd = std::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Replace the current process image; only returns on failure.
#[cfg(unix)]
pub fn reexec_process(spec: &CommandSpec) -> crate::errors::Result<Infallible> {
    use std::os::unix::process::CommandExt;

    info!(cmd = %spec, "re-executing process");
    let err = std_command(spec).exec();
    Err(PrimerError::Other(
        anyhow::Error::new(err).context(format!("re-executing `{spec}`")),
    ))
}

/// Without `exec`, run the successor to completion and exit with its code.
#[cfg(not(unix))]
pub fn reexec_process(spec: &CommandSpec) -> crate::errors::Result<Infallible> {
    info!(cmd = %spec, "re-executing process as child");
    let status = std_command(spec)
        .status()
        .with_context(|| format!("re-executing `{spec}`"))
        .map_err(PrimerError::from)?;
    std::process::exit(status.code().unwrap_or(1));
}
