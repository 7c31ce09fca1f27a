//! Project root resolution and typed config-document loading.

pub mod config;
pub mod paths;

pub use config::{
    BLOCKED_COMMANDS, SAFE_COMMANDS, SECURITY_TIERS, THRESHOLDS, invalidate_cache, load,
};
pub use paths::{
    MARKER_DIR, approvals_dir, config_dir, hook_state_path, logs_dir, memory_dir, metrics_dir,
    project_context_path, resolve_project_root, session_dir, workflow_state_path,
};
