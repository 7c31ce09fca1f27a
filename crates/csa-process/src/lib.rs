//! Process execution: spawn a shell command, capture stdout/stderr, and
//! enforce a timeout. Used by the Five-Layer Agent Executor's Layer E
//! (execution with profiles) to run the external tools (terraform,
//! kubectl, helm, docker, flux) this system dispatches to.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Outcome of running a command to completion or timeout.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

/// Spawn `command` via `sh -c`, isolated in its own process group, and
/// wait up to `timeout` for it to finish, capturing stdout/stderr.
///
/// On timeout, the process group is sent `SIGKILL` and `timed_out=true`
/// is returned with `exit_code=-1`.
pub async fn run_with_timeout(command: &str, cwd: Option<&str>, timeout: Duration) -> Result<ExecutionResult> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::null());
    cmd.kill_on_drop(true);

    // SAFETY: setsid() is async-signal-safe and runs before exec; it puts
    // the child in its own process group so a timeout can kill the whole
    // subtree rather than just the immediate shell.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let start = Instant::now();
    let mut child = cmd.spawn().context("failed to spawn command")?;
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let output = tokio::time::timeout(timeout, async {
        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();
        let (stdout_res, stderr_res, status) = tokio::join!(
            stdout_pipe.read_to_string(&mut stdout_buf),
            stderr_pipe.read_to_string(&mut stderr_buf),
            child.wait(),
        );
        stdout_res.ok();
        stderr_res.ok();
        status.map(|status| (stdout_buf, stderr_buf, status))
    })
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match output {
        Ok(Ok((stdout, stderr, status))) => Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            timed_out: false,
            duration_ms,
        }),
        Ok(Err(err)) => Err(err).context("failed waiting on child process"),
        Err(_) => {
            kill_process_group(&child);
            let _ = child.kill().await;
            Ok(ExecutionResult {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: -1,
                timed_out: true,
                duration_ms,
            })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        // SAFETY: sending SIGKILL to the process group this child leads
        // (it called setsid() in pre_exec) is safe regardless of whether
        // the group is still alive; ESRCH is ignored.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let result = run_with_timeout("echo hello", None, Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.exit_code, 0);
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn captures_nonzero_exit_code() {
        let result = run_with_timeout("exit 2", None, Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn captures_stderr() {
        let result = run_with_timeout("echo oops >&2", None, Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let result = run_with_timeout("sleep 5", None, Duration::from_millis(100)).await.unwrap();
        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
    }
}
