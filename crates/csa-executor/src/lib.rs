//! The Five-Layer Agent Executor: payload validation, local discovery,
//! finding classification, remote validation, and profiled execution
//! for one sub-agent invocation.

pub mod discovery;
pub mod findings;
pub mod payload;
pub mod profiles;
pub mod remote;

pub use discovery::{Configuration, DiscoveredFile, Discrepancy, DiscoveryResult, FileKind, discover, discover_default};
pub use findings::{classify_findings, concise_report, should_escalate_to_live};
pub use payload::{ValidationResult, validate_payload};
pub use profiles::{BackoffStrategy, ExecStatus, ExecutionOutput, Profile, execute_with_profile, standard_profiles};
pub use remote::{ProbeOutcome, probe_command, validate_remote};
