//! Shared vocabulary for the workflow runtime: security tiers, workflow
//! phases, findings, and the error type every other crate propagates.

pub mod error;
pub mod ids;
pub mod types;

pub use error::AppError;
pub use ids::{episode_id, random_hex, session_agent_id, update_id};
pub use types::{
    Finding, FindingOrigin, FindingTier, OperationType, SecurityTier, WorkflowPhase,
};
