//! Wire types for the pre/post tool-hook protocol (stdin/stdout JSON) and
//! the on-disk hook-state handoff between a pre-hook and its matching
//! post-hook.

use std::collections::HashMap;
use std::io;

use csa_core::SecurityTier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::Decision;

/// Pre-hook stdin payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PreHookInput {
    pub tool: String,
    pub parameters: Value,
}

/// Post-hook stdin payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PostHookInput {
    pub tool: String,
    pub parameters: Value,
    pub result: Value,
    pub duration: f64,
    pub exit_code: i32,
    pub hook_event_name: String,
    #[serde(default)]
    pub agent_transcript_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct HookSpecificOutput {
    hook_event_name: String,
    permission_decision: &'static str,
    permission_decision_reason: String,
}

#[derive(Debug, Clone, Serialize)]
struct PermissionDecisionEnvelope {
    #[serde(rename = "hookSpecificOutput")]
    hook_specific_output: HookSpecificOutput,
}

/// Render the host-facing permission decision JSON for a `PreToolUse` hook.
pub fn render_permission_decision(decision: Decision, reason: &str) -> String {
    let permission_decision = match decision {
        Decision::Allow => "allow",
        Decision::Ask => "ask",
        Decision::Deny => "deny",
    };
    let envelope = PermissionDecisionEnvelope {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: "PreToolUse".to_string(),
            permission_decision,
            permission_decision_reason: reason.to_string(),
        },
    };
    serde_json::to_string(&envelope).expect("permission decision always serializes")
}

/// Hook State (spec §3): created by the pre-hook, consumed exactly once by
/// the matching post-hook, then cleared. Exactly one may be live per
/// session at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookState {
    pub tool: String,
    pub command: String,
    pub tier: SecurityTier,
    pub start_timestamp_ms: u128,
    pub session_id: String,
    pub pre_decision: Decision,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Write the hook state file, overwriting any previous (unconsumed) state.
/// Per spec's one-writer-one-reader contract this uses a plain write, not
/// temp-file-then-rename, because the file is ephemeral and single-session.
pub fn write_hook_state(path: &std::path::Path, state: &HookState) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(state)?;
    std::fs::write(path, json)
}

/// Read and delete the hook state file (consume-once semantics). Returns
/// `Ok(None)` if no hook state is pending.
pub fn take_hook_state(path: &std::path::Path) -> io::Result<Option<HookState>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let state = serde_json::from_slice(&bytes)?;
            std::fs::remove_file(path)?;
            Ok(Some(state))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
