//! Layer D — remote validation. Runs only when Layer C escalated. Each
//! high-tier finding that names a live-resource probe is checked
//! through the Policy Engine; in `dry_run` mode (the default) the probe
//! is never actually run, only simulated against policy.

use csa_hooks::{PolicySettings, evaluate};
use serde::Serialize;

use csa_core::{FindingOrigin, FindingTier};

use crate::findings as layer_c;

/// A finding paired with the read-only command that would check it
/// against live infrastructure. Findings carry this in
/// `details["probe_command"]` when Layer B/C determined one applies.
pub fn probe_command(finding: &csa_core::Finding) -> Option<String> {
    finding.details.get("probe_command").and_then(|v| v.as_str()).map(str::to_string)
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub command: String,
    pub would_allow: bool,
    /// `true` when `dry_run=true` and the probe was only evaluated
    /// against policy, not actually executed.
    pub simulated: bool,
    pub reason: String,
}

/// Evaluate (and, unless `dry_run`, run) a read-only probe for every
/// `CRITICAL`/`DEVIATION` finding carrying a `probe_command`. When not
/// simulating, `run` executes the probe and its stdout feeds back into
/// origin reconciliation; callers that only need the simulate path can
/// pass a `run` that is never invoked by setting `dry_run=true`.
pub fn validate_remote(
    findings: &mut [csa_core::Finding],
    settings: &PolicySettings,
    dry_run: bool,
    mut run: impl FnMut(&str) -> Option<String>,
) -> Vec<ProbeOutcome> {
    if !layer_c::should_escalate_to_live(findings) {
        return Vec::new();
    }

    let mut outcomes = Vec::new();
    for finding in findings.iter_mut() {
        if !matches!(finding.tier, FindingTier::Critical | FindingTier::Deviation) {
            continue;
        }
        let Some(command) = probe_command(finding) else {
            continue;
        };

        let policy = evaluate(settings, &command, None);
        let would_allow = matches!(policy.decision, csa_hooks::Decision::Allow);

        if dry_run {
            outcomes.push(ProbeOutcome {
                command,
                would_allow,
                simulated: true,
                reason: policy.reason,
            });
            continue;
        }

        if would_allow {
            if let Some(live_output) = run(&command) {
                reconcile_origin(finding, &live_output);
            }
        }
        outcomes.push(ProbeOutcome { command, would_allow, simulated: false, reason: policy.reason });
    }
    outcomes
}

/// Adjust a finding's origin once live data is available: a previously
/// `LocalOnly` finding whose description text doesn't appear in the
/// live probe output becomes `Conflicting`; otherwise `DualVerified`.
fn reconcile_origin(finding: &mut csa_core::Finding, live_output: &str) {
    if finding.origin != FindingOrigin::LocalOnly {
        return;
    }
    finding.origin = if live_output.contains(&finding.title) {
        FindingOrigin::DualVerified
    } else {
        FindingOrigin::Conflicting
    };
}
