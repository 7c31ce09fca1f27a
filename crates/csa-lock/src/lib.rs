//! File-based locking using `flock(2)` syscall directly.
//! Independent crate with no internal csa dependencies.
//!
//! Uses raw `libc::flock` instead of RAII lock wrappers to avoid the
//! self-referential struct problem: an RAII guard borrows the lock owner,
//! making it impossible to store both in the same struct without lifetime
//! gymnastics (`Box::leak`, `ouroboros`, etc.).
//!
//! By calling `flock(2)` directly, we only need to own the `File` (which
//! owns the fd). `Drop` calls `flock(fd, LOCK_UN)` to release.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Diagnostic information written to lock files
#[derive(Debug, Serialize, Deserialize)]
struct LockDiagnostic {
    pid: u32,
    tool_name: String,
    acquired_at: DateTime<Utc>,
    reason: String,
}

/// Session lock guard backed by `flock(2)`.
///
/// Holds the open `File` whose fd carries the advisory lock.
/// On `Drop`, the lock is explicitly released via `flock(fd, LOCK_UN)`.
pub struct SessionLock {
    /// The open lock file. Closing it also releases flock, but we call
    /// `LOCK_UN` explicitly in `Drop` for deterministic release timing.
    file: File,
    lock_path: PathBuf,
}

impl std::fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is a valid file descriptor owned by `self.file`.
        // `LOCK_UN` releases the advisory lock. If the call fails (which is
        // extremely unlikely for a valid fd), the lock will still be released
        // when the fd is closed moments later.
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }
    }
}

impl SessionLock {
    /// Get the path to the lock file
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// Acquire a non-blocking exclusive lock for a session and tool.
///
/// Lock path: `{session_dir}/locks/{tool_name}.lock`
///
/// On success:
/// - Acquires exclusive advisory lock via `flock(2)` with `LOCK_NB`
/// - Writes diagnostic JSON (pid, tool_name, acquired_at, reason) to lock file
/// - Returns `SessionLock` guard that releases on drop
///
/// On failure:
/// - Attempts to read existing lock file to report which PID holds it
/// - Returns error with diagnostic information
pub fn acquire_lock(session_dir: &Path, tool_name: &str, reason: &str) -> Result<SessionLock> {
    let locks_dir = session_dir.join("locks");
    fs::create_dir_all(&locks_dir)
        .with_context(|| format!("Failed to create locks directory: {}", locks_dir.display()))?;

    let lock_path = locks_dir.join(format!("{}.lock", tool_name));

    // Open or create the lock file
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    let fd = file.as_raw_fd();

    // SAFETY: `fd` is a valid file descriptor from the `File` we just opened.
    // `LOCK_EX | LOCK_NB` requests an exclusive non-blocking lock.
    // The return value is checked for error handling.
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

    if ret == 0 {
        // Lock acquired successfully. Write diagnostic information.
        let mut lock = SessionLock { file, lock_path };

        let diagnostic = LockDiagnostic {
            pid: std::process::id(),
            tool_name: tool_name.to_string(),
            acquired_at: Utc::now(),
            reason: reason.to_string(),
        };

        let json =
            serde_json::to_string(&diagnostic).context("Failed to serialize lock diagnostic")?;

        lock.file
            .set_len(0)
            .context("Failed to truncate lock file")?;
        lock.file
            .write_all(json.as_bytes())
            .context("Failed to write lock diagnostic")?;
        lock.file.flush().context("Failed to flush lock file")?;

        Ok(lock)
    } else {
        // Lock is held by another process, try to read diagnostic info
        let mut diag_file =
            File::open(&lock_path).context("Failed to open lock file to read diagnostic")?;
        let mut contents = String::new();
        diag_file
            .read_to_string(&mut contents)
            .context("Failed to read lock file")?;

        let error_msg = if let Ok(diagnostic) = serde_json::from_str::<LockDiagnostic>(&contents) {
            format!(
                "Session locked by PID {} (tool: {}, reason: {}, acquired: {})",
                diagnostic.pid, diagnostic.tool_name, diagnostic.reason, diagnostic.acquired_at
            )
        } else {
            "Session is locked (unable to read diagnostic info)".to_string()
        };

        Err(anyhow::anyhow!(error_msg))
    }
}

/// Acquire a lock for `tool_name` under `session_dir`, retrying with
/// exponential backoff (starting at 50ms, doubling, capped at 1s) until
/// either the lock is acquired or `timeout` elapses.
///
/// Store operations are short read-modify-write sequences, so a held lock
/// is expected to clear quickly; this exists so a concurrent writer waits
/// its turn instead of failing the whole operation on first contention.
pub fn acquire_lock_blocking(
    session_dir: &Path,
    tool_name: &str,
    reason: &str,
    timeout: Duration,
) -> Result<SessionLock> {
    let deadline = Instant::now() + timeout;
    let mut backoff = Duration::from_millis(50);

    loop {
        match acquire_lock(session_dir, tool_name, reason) {
            Ok(lock) => return Ok(lock),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(err.context(format!(
                        "timed out after {:?} waiting for lock on {tool_name}",
                        timeout
                    )));
                }
                sleep(backoff.min(deadline.saturating_duration_since(Instant::now())));
                backoff = (backoff * 2).min(Duration::from_secs(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_lock_succeeds() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let lock = acquire_lock(session_dir, "test-tool", "test reason");
        assert!(lock.is_ok(), "Lock acquisition should succeed");

        let lock = lock.unwrap();
        assert!(lock.lock_path().exists(), "Lock file should exist");
    }

    #[test]
    fn test_lock_file_path() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let lock =
            acquire_lock(session_dir, "test-tool", "test reason").expect("Failed to acquire lock");

        let expected_path = session_dir.join("locks/test-tool.lock");
        assert_eq!(lock.lock_path(), expected_path);
        assert!(
            expected_path.exists(),
            "Lock file should exist at correct path"
        );
    }

    #[test]
    fn test_lock_diagnostic_written() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let _lock =
            acquire_lock(session_dir, "test-tool", "test reason").expect("Failed to acquire lock");

        let lock_path = session_dir.join("locks/test-tool.lock");
        let contents = fs::read_to_string(&lock_path).expect("Failed to read lock file");

        let diagnostic: LockDiagnostic =
            serde_json::from_str(&contents).expect("Failed to parse diagnostic JSON");

        assert_eq!(diagnostic.pid, std::process::id());
        assert_eq!(diagnostic.tool_name, "test-tool");
        assert_eq!(diagnostic.reason, "test reason");
    }

    #[test]
    fn test_second_lock_fails() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let _lock1 = acquire_lock(session_dir, "test-tool", "first reason")
            .expect("First lock should succeed");

        let result = acquire_lock(session_dir, "test-tool", "second reason");
        assert!(result.is_err(), "Second lock should fail");

        let err_msg = result.unwrap_err().to_string();
        assert!(
            err_msg.contains("Session locked by PID"),
            "Error message should contain PID info"
        );
        assert!(
            err_msg.contains("reason: first reason"),
            "Error message should contain reason info"
        );
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        {
            let _lock = acquire_lock(session_dir, "test-tool", "test reason")
                .expect("First lock should succeed");
            // Lock is held here
        } // Lock is dropped here

        // Note: flock locks are process-scoped, not thread-scoped.
        // Within the same process, the lock is still held even after close
        // because flock only releases when ALL fds referencing the same
        // open file description are closed. This test documents the behavior
        // but won't actually re-acquire within the same process.
        // In real usage across processes, the lock is properly released.
    }

    #[test]
    fn test_different_tools_different_locks() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let lock1 =
            acquire_lock(session_dir, "tool-a", "reason a").expect("Tool A lock should succeed");
        let lock2 =
            acquire_lock(session_dir, "tool-b", "reason b").expect("Tool B lock should succeed");

        assert_ne!(
            lock1.lock_path(),
            lock2.lock_path(),
            "Different tools should have different lock files"
        );
    }

    #[test]
    fn test_lock_path_follows_convention() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let lock = acquire_lock(session_dir, "episode-store", "running task").expect("Lock should succeed");

        // Convention: {session_dir}/locks/{tool_name}.lock
        let expected = session_dir.join("locks").join("episode-store.lock");
        assert_eq!(lock.lock_path(), expected);
    }

    #[test]
    fn test_acquire_lock_blocking_succeeds_immediately_when_uncontended() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let lock = acquire_lock_blocking(session_dir, "test-tool", "reason", Duration::from_millis(500));
        assert!(lock.is_ok());
    }

    #[test]
    fn test_acquire_lock_blocking_waits_for_release_then_succeeds() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let first = acquire_lock(session_dir, "test-tool", "held").expect("first lock");
        let (tx, rx) = std::sync::mpsc::channel();
        let session_dir_owned = session_dir.to_path_buf();
        let handle = std::thread::spawn(move || {
            let lock = acquire_lock_blocking(
                &session_dir_owned,
                "test-tool",
                "waiter",
                Duration::from_secs(5),
            );
            tx.send(()).ok();
            lock.is_ok()
        });

        // Give the waiter a moment to start polling, then release.
        sleep(Duration::from_millis(150));
        drop(first);

        rx.recv_timeout(Duration::from_secs(5)).expect("waiter did not finish");
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_acquire_lock_blocking_times_out_when_never_released() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let _held = acquire_lock(session_dir, "test-tool", "held forever").expect("first lock");
        let result = acquire_lock_blocking(session_dir, "test-tool", "waiter", Duration::from_millis(200));
        assert!(result.is_err());
    }

    #[test]
    fn test_locks_dir_created_automatically() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        // locks/ subdir should not exist yet
        assert!(!session_dir.join("locks").exists());

        let _lock = acquire_lock(session_dir, "auto-dir", "test").expect("Lock should succeed");

        assert!(session_dir.join("locks").exists());
        assert!(session_dir.join("locks").is_dir());
    }

    #[test]
    fn test_acquire_lock_nonexistent_parent_dir() {
        // session_dir itself does not exist — create_dir_all should handle it
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path().join("deep").join("nested").join("session");

        let lock = acquire_lock(&session_dir, "tool", "reason");
        assert!(lock.is_ok(), "Should create intermediate dirs");
    }

    #[test]
    fn test_acquire_lock_invalid_path() {
        // /dev/null is a file, not a directory — creating locks/ under it should fail
        let result = acquire_lock(Path::new("/dev/null"), "tool", "reason");
        assert!(
            result.is_err(),
            "Should fail for non-directory session path"
        );
    }

    #[test]
    fn test_lock_debug_format() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let lock = acquire_lock(session_dir, "debug-tool", "test").expect("Lock should succeed");

        let debug = format!("{:?}", lock);
        assert!(debug.contains("SessionLock"));
        assert!(debug.contains("lock_path"));
    }

    #[test]
    fn test_second_lock_error_contains_diagnostic() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let session_dir = temp_dir.path();

        let _lock1 = acquire_lock(session_dir, "diag-tool", "first task")
            .expect("First lock should succeed");

        let err = acquire_lock(session_dir, "diag-tool", "second task")
            .unwrap_err()
            .to_string();

        // Error must contain PID, tool name, and original reason
        assert!(err.contains(&std::process::id().to_string()), "missing PID");
        assert!(err.contains("diag-tool"), "missing tool name");
        assert!(err.contains("first task"), "missing original reason");
    }
}
