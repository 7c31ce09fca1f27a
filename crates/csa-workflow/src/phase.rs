//! Workflow phases (spec §4.14) and the pre/post guard results that gate
//! transitions between them.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Clarification,
    Routing,
    Context,
    Planning,
    Approval,
    Realization,
    SsotUpdate,
}

impl Phase {
    pub fn number(self) -> u8 {
        match self {
            Self::Clarification => 0,
            Self::Routing => 1,
            Self::Context => 2,
            Self::Planning => 3,
            Self::Approval => 4,
            Self::Realization => 5,
            Self::SsotUpdate => 6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseValidationResult {
    pub allowed: bool,
    pub reason: String,
    pub phase: Phase,
}

impl PhaseValidationResult {
    fn allow(phase: Phase, reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into(), phase }
    }

    fn deny(phase: Phase, reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: reason.into(), phase }
    }
}

use csa_core::SecurityTier;

/// Phase 1 pre-guard: routing must have cleared the confidence floor and
/// named a known agent.
pub fn validate_pre_routing(routing_confidence: Option<f64>, agent_known: bool) -> PhaseValidationResult {
    match routing_confidence {
        None => PhaseValidationResult::deny(Phase::Routing, "no agent cleared the routing confidence threshold"),
        Some(confidence) if !agent_known => {
            PhaseValidationResult::deny(Phase::Routing, format!("routed agent is not registered (confidence {confidence})"))
        }
        Some(_) => PhaseValidationResult::allow(Phase::Routing, "routing guard passed"),
    }
}

/// Phase 2 pre-guard: every section the routed agent requires must be
/// present. `missing` is whatever [`crate::context::provision_context`]
/// returned as its error.
pub fn validate_pre_context(missing: &[String]) -> PhaseValidationResult {
    if missing.is_empty() {
        PhaseValidationResult::allow(Phase::Context, "context guard passed")
    } else {
        PhaseValidationResult::deny(Phase::Context, format!("missing context sections: {}", missing.join(", ")))
    }
}

/// Phase 5 pre-guard: T3 realization may not proceed without a matching,
/// unconsumed approval.
pub fn validate_pre_realization(tier: SecurityTier, approved: bool) -> PhaseValidationResult {
    if tier == SecurityTier::T3 && !approved {
        PhaseValidationResult::deny(Phase::Realization, "T3 operation requires approval before realization")
    } else {
        PhaseValidationResult::allow(Phase::Realization, "realization guard passed")
    }
}

/// Phase 6 pre-guard: the SSOT may only be updated after a successful
/// realization.
pub fn validate_pre_ssot_update(realization_success: bool) -> PhaseValidationResult {
    if realization_success {
        PhaseValidationResult::allow(Phase::SsotUpdate, "ssot update guard passed")
    } else {
        PhaseValidationResult::deny(Phase::SsotUpdate, "cannot update ssot: realization failed")
    }
}

/// Phase 4 post-guard: a T3 operation that wasn't approved may not carry
/// on into realization.
pub fn validate_post_approval(tier: SecurityTier, approved: bool) -> PhaseValidationResult {
    if tier == SecurityTier::T3 && !approved {
        PhaseValidationResult::deny(Phase::Approval, "t3 approval rejected")
    } else {
        PhaseValidationResult::allow(Phase::Approval, "approval validation passed")
    }
}

/// Phase 6 post-guard: a T3 operation must leave a SSOT update behind.
pub fn validate_post_ssot_update(tier: SecurityTier, ssot_updated: bool) -> PhaseValidationResult {
    if tier == SecurityTier::T3 && !ssot_updated {
        PhaseValidationResult::deny(Phase::SsotUpdate, "t3 operation completed but ssot not updated")
    } else {
        PhaseValidationResult::allow(Phase::SsotUpdate, "ssot update validation passed")
    }
}
