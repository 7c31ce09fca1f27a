//! Shell command decomposition, security-tier classification, and the
//! Policy Engine that turns a tool invocation into an allow/ask/deny
//! decision. Also carries the pre/post hook wire protocol and the
//! hook-state handoff file.

pub mod gitops;
pub mod patterns;
pub mod policy;
pub mod protocol;
pub mod shell_parser;
pub mod tiers;

pub use gitops::{GitOpsValidationResult, Severity, validate_gitops_workflow};
pub use patterns::{CompiledPattern, PatternKind, PatternList};
pub use policy::{Decision, PolicyResult, PolicySettings, evaluate};
pub use protocol::{HookState, PostHookInput, PreHookInput, render_permission_decision};
pub use shell_parser::parse as parse_shell_command;
pub use tiers::{classify as classify_tier, effective_tier};
