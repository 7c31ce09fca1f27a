//! Workflow orchestration: routes an enriched prompt to a sub-agent,
//! provisions its context, runs it through the Five-Layer Agent
//! Executor, gates T3 operations behind human approval, and records the
//! episode and any pending-update discoveries that result.

pub mod approval;
pub mod context;
pub mod orchestrator;
pub mod phase;
pub mod router;

pub use approval::{ApprovalGate, ApprovalRecord, GateOutcome, response_is_approval, APPROVAL_INDICATORS};
pub use context::{AgentContract, provision_context};
pub use orchestrator::{WorkflowOrchestrator, WorkflowOutcome, WorkflowRequest};
pub use phase::{Phase, PhaseValidationResult};
pub use router::{AgentDeclaration, RoutingResult, route, standard_agents, MIN_ROUTING_CONFIDENCE};
