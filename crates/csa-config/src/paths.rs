//! Resolves the per-project data root and the directories the rest of the
//! runtime reads and writes under it. The marker directory is `.claude`,
//! searched for upward from the current working directory the same way a
//! VCS client walks up looking for `.git`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use csa_core::AppError;

/// Name of the marker directory that identifies a project root.
pub const MARKER_DIR: &str = ".claude";

static PROJECT_ROOT: OnceLock<PathBuf> = OnceLock::new();

fn find_marker_upward(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(MARKER_DIR).is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Locate the project root by walking upward from the current working
/// directory for a `.claude` marker directory. Cached for the process
/// lifetime: the first successful resolution wins for all later calls.
pub fn resolve_project_root() -> Result<PathBuf, AppError> {
    if let Some(root) = PROJECT_ROOT.get() {
        return Ok(root.clone());
    }
    let cwd = std::env::current_dir().map_err(AppError::Io)?;
    let root = find_marker_upward(&cwd).ok_or(AppError::ProjectRootNotFound)?;
    Ok(PROJECT_ROOT.get_or_init(|| root).clone())
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(&path).map_err(AppError::Io)?;
    Ok(path)
}

/// `logs/` under the project data root. Created if absent.
pub fn logs_dir() -> Result<PathBuf, AppError> {
    ensure_dir(resolve_project_root()?.join(MARKER_DIR).join("logs"))
}

/// `metrics/` under the project data root. Created if absent.
pub fn metrics_dir() -> Result<PathBuf, AppError> {
    ensure_dir(resolve_project_root()?.join(MARKER_DIR).join("metrics"))
}

/// `project-context/<subdir?>` under the project data root, e.g. the
/// episodic-memory or pending-updates stores. Created if absent.
pub fn memory_dir(subdir: Option<&str>) -> Result<PathBuf, AppError> {
    let mut path = resolve_project_root()?
        .join(MARKER_DIR)
        .join("project-context");
    if let Some(subdir) = subdir {
        path = path.join(subdir);
    }
    ensure_dir(path)
}

/// `session/` under the project data root. Created if absent.
pub fn session_dir() -> Result<PathBuf, AppError> {
    ensure_dir(resolve_project_root()?.join(MARKER_DIR).join("session"))
}

/// `approvals/` under the project data root. Created if absent.
pub fn approvals_dir() -> Result<PathBuf, AppError> {
    ensure_dir(resolve_project_root()?.join(MARKER_DIR).join("approvals"))
}

/// Directory holding the runtime's own config documents. Created if absent.
pub fn config_dir() -> Result<PathBuf, AppError> {
    ensure_dir(resolve_project_root()?.join(MARKER_DIR).join("config"))
}

/// Path to the pre->post hook-state handoff file.
pub fn hook_state_path() -> Result<PathBuf, AppError> {
    Ok(resolve_project_root()?.join(MARKER_DIR).join(".hooks_state.json"))
}

/// Path to the current-phase workflow state file.
pub fn workflow_state_path() -> Result<PathBuf, AppError> {
    Ok(resolve_project_root()?
        .join(MARKER_DIR)
        .join(".workflow_state.json"))
}

/// Path to the externally-owned project context document.
pub fn project_context_path() -> Result<PathBuf, AppError> {
    Ok(memory_dir(None)?.join("project-context.json"))
}
