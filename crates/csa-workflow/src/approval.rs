//! Approval Gate (spec §4.13): guards every T3 operation behind a
//! human-approved, single-use approval file.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use csa_core::{AppError, SecurityTier};
use serde::{Deserialize, Serialize};

/// Canonical approval phrases, matched case-insensitively against the
/// human's response. `"user approved:"` (with a trailing scope) is the
/// preferred, scoped form; the rest are legacy synonyms.
pub const APPROVAL_INDICATORS: &[&str] = &[
    "user approved:",
    "user approval received",
    "approved by user",
    "user approved",
    "approved. execute",
    "approved, execute",
    "approval confirmed",
    "proceed with execution",
    "go ahead",
    "confirmed. proceed",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub agent: String,
    pub operation: String,
    pub tier: SecurityTier,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Planned tier wasn't T3; the gate passes without asking.
    AutoPassed,
    Approved(ApprovalRecord),
    Rejected,
}

/// `true` if `response`, lower-cased, contains any canonical approval
/// phrase.
pub fn response_is_approval(response: &str) -> bool {
    let lower = response.to_ascii_lowercase();
    APPROVAL_INDICATORS.iter().any(|phrase| lower.contains(phrase))
}

pub struct ApprovalGate {
    /// Path to `approvals/pending.json`.
    path: PathBuf,
}

impl ApprovalGate {
    pub fn new(path: PathBuf) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(AppError::Io)?;
        }
        Ok(Self { path })
    }

    /// Run the gate for one planned operation. Auto-passes non-T3
    /// operations. For T3, matches `human_response` against the
    /// canonical phrase list; on match, writes the single-use approval
    /// file. The caller is expected to have already displayed the plan
    /// to the human via the AskQuestion interface before calling this.
    pub fn request(
        &self,
        planned_tier: SecurityTier,
        agent: &str,
        operation: &str,
        scope: &str,
        human_response: &str,
        ttl: Duration,
    ) -> Result<GateOutcome, AppError> {
        if planned_tier != SecurityTier::T3 {
            return Ok(GateOutcome::AutoPassed);
        }

        if !response_is_approval(human_response) {
            return Ok(GateOutcome::Rejected);
        }

        let record = ApprovalRecord {
            agent: agent.to_string(),
            operation: operation.to_string(),
            tier: planned_tier,
            scope: scope.to_string(),
            expires_at: Utc::now() + ttl,
        };
        self.write(&record)?;
        Ok(GateOutcome::Approved(record))
    }

    fn write(&self, record: &ApprovalRecord) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(AppError::Io)?;
        tmp.write_all(&bytes).map_err(AppError::Io)?;
        tmp.persist(&self.path).map_err(|err| AppError::Io(err.error))?;
        Ok(())
    }

    fn read(&self) -> Option<ApprovalRecord> {
        let bytes = std::fs::read(&self.path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// A T3 sub-agent invocation MUST consume the matching approval
    /// file exactly once. The post-execution hook calls this
    /// regardless of outcome: the file is deleted whether or not it
    /// matched, so a stale or mismatched approval can never be reused.
    pub fn consume(&self, agent: &str, operation: &str) -> Result<bool, AppError> {
        let record = self.read();
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(AppError::Io)?;
        }
        let Some(record) = record else {
            return Ok(false);
        };
        let valid = record.agent == agent && record.operation == operation && record.expires_at > Utc::now();
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> (tempfile::TempDir, ApprovalGate) {
        let dir = tempfile::tempdir().unwrap();
        let gate = ApprovalGate::new(dir.path().join("approvals/pending.json")).unwrap();
        (dir, gate)
    }

    #[test]
    fn non_t3_operations_auto_pass() {
        let (_d, gate) = gate();
        let outcome = gate.request(SecurityTier::T1, "terraform-architect", "terraform plan", "prod", "", Duration::minutes(10)).unwrap();
        assert_eq!(outcome, GateOutcome::AutoPassed);
    }

    #[test]
    fn scoped_canonical_phrase_is_recognized() {
        assert!(response_is_approval("User approved: terraform apply prod"));
        assert!(response_is_approval("go ahead, looks good"));
        assert!(!response_is_approval("looks risky, let's not"));
    }

    #[test]
    fn approval_writes_single_use_file_consumed_exactly_once() {
        let (_d, gate) = gate();
        let outcome = gate
            .request(SecurityTier::T3, "terraform-architect", "terraform apply", "prod", "User approved: terraform apply prod", Duration::minutes(10))
            .unwrap();
        assert!(matches!(outcome, GateOutcome::Approved(_)));

        assert!(gate.consume("terraform-architect", "terraform apply").unwrap());
        // Consuming again finds nothing: the file was deleted.
        assert!(!gate.consume("terraform-architect", "terraform apply").unwrap());
    }

    #[test]
    fn rejection_is_reported_and_nothing_is_written() {
        let (_d, gate) = gate();
        let outcome =
            gate.request(SecurityTier::T3, "terraform-architect", "terraform apply", "prod", "no thanks", Duration::minutes(10)).unwrap();
        assert_eq!(outcome, GateOutcome::Rejected);
        assert!(!gate.consume("terraform-architect", "terraform apply").unwrap());
    }

    #[test]
    fn consume_rejects_mismatched_agent_but_still_deletes_file() {
        let (_d, gate) = gate();
        gate.request(SecurityTier::T3, "terraform-architect", "terraform apply", "prod", "go ahead", Duration::minutes(10)).unwrap();
        assert!(!gate.consume("gitops-operator", "terraform apply").unwrap());
        assert!(!gate.consume("terraform-architect", "terraform apply").unwrap());
    }
}
