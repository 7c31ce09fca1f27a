//! The audit record shape written to the daily and per-session journals
//! (spec §4.5).

use chrono::{DateTime, Utc};
use csa_core::SecurityTier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::{hash_output, output_preview, sanitize_params};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub tool: String,
    pub command: String,
    pub params_sanitized: Value,
    pub duration_ms: u64,
    pub exit_code: i32,
    pub tier: SecurityTier,
    pub output_hash: String,
    pub output_preview: String,
}

impl AuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        tool: impl Into<String>,
        command: impl Into<String>,
        params: &Value,
        duration_ms: u64,
        exit_code: i32,
        tier: SecurityTier,
        output: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            tool: tool.into(),
            command: command.into(),
            params_sanitized: sanitize_params(params),
            duration_ms,
            exit_code,
            tier,
            output_hash: hash_output(output),
            output_preview: output_preview(output, 200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_sanitizes_params_and_hashes_output() {
        let record = AuditRecord::new(
            "session-1",
            "bash",
            "terraform plan",
            &json!({"token": "abc123"}),
            150,
            0,
            SecurityTier::T2,
            "Plan: 3 to add, 0 to change, 0 to destroy.",
        );
        assert_eq!(record.params_sanitized["token"], "[REDACTED]");
        assert_eq!(record.output_hash.len(), 16);
        assert_eq!(record.tier, SecurityTier::T2);
    }
}
