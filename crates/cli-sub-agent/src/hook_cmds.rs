use std::io::Read as _;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use csa_audit::AuditRecord;
use csa_hooks::protocol::{HookState, PostHookInput, PreHookInput, take_hook_state, write_hook_state};
use csa_hooks::{PolicySettings, evaluate, render_permission_decision};

/// Commands considered forbidden in attribution footers, stripped from the
/// default commit-message policy rather than sourced from a config document
/// (no on-disk document names this list yet).
const FORBIDDEN_FOOTERS: &[&str] = &["Generated with", "Co-Authored-By: Claude"];

fn policy_settings() -> PolicySettings {
    let safe = csa_config::load(csa_config::SAFE_COMMANDS);
    let blocked = csa_config::load(csa_config::BLOCKED_COMMANDS);

    let safe_prefixes: Vec<String> = safe
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let blocked_patterns: Vec<String> = blocked
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    PolicySettings::new(
        FORBIDDEN_FOOTERS.iter().map(|s| s.to_string()).collect(),
        &blocked_patterns,
        &[],
        &safe_prefixes.clone(),
        safe_prefixes,
    )
}

fn session_id() -> String {
    std::env::var("CSA_SESSION_ID").unwrap_or_else(|_| csa_core::session_agent_id())
}

fn command_text(parameters: &serde_json::Value) -> String {
    parameters
        .get("command")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| parameters.to_string())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading hook payload from stdin")?;
    Ok(buf)
}

/// `csa hook pre`: evaluate policy for one tool invocation and print the
/// host-facing permission decision. Persists a hook-state handoff file for
/// the matching post-hook to consume.
pub fn run_pre() -> Result<()> {
    let raw = read_stdin()?;
    let input: PreHookInput = serde_json::from_str(&raw).context("parsing PreToolUse payload")?;

    let command = command_text(&input.parameters);
    let agent_name = input.parameters.get("agent_name").and_then(|v| v.as_str());
    let settings = policy_settings();
    let result = evaluate(&settings, &command, agent_name);

    println!("{}", render_permission_decision(result.decision, &result.reason));

    let state = HookState {
        tool: input.tool,
        command,
        tier: result.effective_tier,
        start_timestamp_ms: now_millis(),
        session_id: session_id(),
        pre_decision: result.decision,
        metadata: Default::default(),
    };
    if let Ok(path) = csa_config::paths::hook_state_path() {
        if let Err(err) = write_hook_state(&path, &state) {
            tracing::warn!(error = %err, "failed to persist hook state");
        }
    }
    Ok(())
}

/// `csa hook post`: consume the matching hook state and write an audit
/// record. Best-effort: failures here are logged, never propagated, per
/// the hook-path error policy.
pub fn run_post() -> Result<()> {
    let raw = read_stdin()?;
    let input: PostHookInput = serde_json::from_str(&raw).context("parsing PostToolUse payload")?;

    let state = csa_config::paths::hook_state_path()
        .ok()
        .and_then(|path| take_hook_state(&path).ok().flatten());

    let (tier, session, command) = match state {
        Some(s) => (s.tier, s.session_id, s.command),
        None => (
            csa_hooks::classify_tier(&command_text(&input.parameters), false, &[]),
            session_id(),
            command_text(&input.parameters),
        ),
    };

    let output = input.result.to_string();
    let record = AuditRecord::new(
        session,
        input.tool,
        command,
        &input.parameters,
        (input.duration * 1000.0).round() as u64,
        input.exit_code,
        tier,
        &output,
    );

    if let (Ok(logs_dir), Ok(metrics_dir)) =
        (csa_config::paths::logs_dir(), csa_config::paths::metrics_dir())
    {
        csa_audit::AuditSink::new(logs_dir, metrics_dir).record_best_effort(&record);
    } else {
        tracing::warn!("could not resolve audit directories; dropping audit record");
    }

    Ok(())
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
