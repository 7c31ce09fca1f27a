//! The Session type (spec §3, §4.7): a resumable per-agent execution
//! session, its phase state machine, and its append-only transition
//! history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const RESUME_WINDOW_MINUTES: i64 = 30;
const MAX_ERRORS_FOR_RESUME: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    Investigating,
    Planning,
    Approval,
    Executing,
    Validating,
    Completed,
    Failed,
    Abandoned,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Investigating => "investigating",
            Self::Planning => "planning",
            Self::Approval => "approval",
            Self::Executing => "executing",
            Self::Validating => "validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }

    /// The subset of phases a session may be resumed from (spec §4.7).
    pub fn is_resumable_phase(self) -> bool {
        matches!(self, Self::Approval | Self::Investigating | Self::Planning)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from_phase: Option<SessionPhase>,
    pub to_phase: SessionPhase,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub agent_id: String,
    pub agent_name: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub phase: SessionPhase,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(agent_name: String, purpose: String, metadata: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            agent_id: csa_core::session_agent_id(),
            agent_name,
            purpose,
            created_at: now,
            last_updated: now,
            phase: SessionPhase::Initializing,
            metadata,
            history: vec![HistoryEntry {
                from_phase: None,
                to_phase: SessionPhase::Initializing,
                timestamp: now,
            }],
            error_count: 0,
            last_error: None,
        }
    }

    /// The spec's resume-eligibility conjunction (§4.7, §8 property 8):
    /// phase is in the resumable subset, `last_updated` is within the
    /// resume window, and the error count hasn't tripped the limit.
    /// Terminal phases always short-circuit to `false`.
    pub fn resume_ready(&self, now: DateTime<Utc>) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        let within_window =
            now.signed_duration_since(self.last_updated) < chrono::Duration::minutes(RESUME_WINDOW_MINUTES);
        self.phase.is_resumable_phase() && within_window && self.error_count < MAX_ERRORS_FOR_RESUME
    }

    pub fn record_transition(&mut self, to_phase: SessionPhase) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            from_phase: Some(self.phase),
            to_phase,
            timestamp: now,
        });
        self.phase = to_phase;
        self.last_updated = now;
    }

    pub fn record_error(&mut self, error: String) {
        self.error_count += 1;
        self.last_error = Some(error);
        self.last_updated = Utc::now();
    }
}
