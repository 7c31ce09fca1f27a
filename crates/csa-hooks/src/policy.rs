//! Combines the tier classifier, deny/ask/allow pattern lists, and GitOps
//! rules into one allow/ask/deny decision for a tool invocation.

use csa_core::SecurityTier;
use serde::{Deserialize, Serialize};

use crate::gitops;
use crate::patterns::PatternList;
use crate::shell_parser;
use crate::tiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Ask,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    pub decision: Decision,
    pub effective_tier: SecurityTier,
    pub reason: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub requires_credentials: bool,
}

/// Static settings driving one evaluation: forbidden footers, blocked
/// patterns (deny), ask patterns, allow patterns, and the externally
/// configured safe read-only prefixes the tier classifier consults.
pub struct PolicySettings {
    pub forbidden_footers: Vec<String>,
    pub blocked_patterns: PatternList,
    pub ask_patterns: PatternList,
    pub allow_patterns: PatternList,
    pub safe_prefixes: Vec<String>,
}

impl PolicySettings {
    pub fn new(
        forbidden_footers: Vec<String>,
        blocked: &[String],
        ask: &[String],
        allow: &[String],
        safe_prefixes: Vec<String>,
    ) -> Self {
        Self {
            forbidden_footers,
            blocked_patterns: PatternList::compile(blocked),
            ask_patterns: PatternList::compile(ask),
            allow_patterns: PatternList::compile(allow),
            safe_prefixes,
        }
    }
}

/// Evaluate a full (possibly compound) command string against policy.
/// `agent_name`, when it names the `gitops-operator` agent, triggers the
/// stricter GitOps apply-verb rule.
pub fn evaluate(settings: &PolicySettings, command: &str, agent_name: Option<&str>) -> PolicyResult {
    if settings
        .forbidden_footers
        .iter()
        .any(|footer| command.contains(footer.as_str()))
    {
        return PolicyResult {
            decision: Decision::Deny,
            effective_tier: SecurityTier::T3,
            reason: "command contains a forbidden attribution footer".to_string(),
            suggestions: Vec::new(),
            requires_credentials: false,
        };
    }

    let components = shell_parser::parse(command);
    if components.is_empty() {
        return PolicyResult {
            decision: Decision::Deny,
            effective_tier: SecurityTier::T3,
            reason: "empty command".to_string(),
            suggestions: Vec::new(),
            requires_credentials: false,
        };
    }

    let mut effective_tier = SecurityTier::T0;
    let mut suggestions = Vec::new();
    let mut requires_credentials = false;
    let mut blocked_reason: Option<String> = None;

    for component in &components {
        let has_blocked = settings.blocked_patterns.any_match(component);
        if has_blocked && blocked_reason.is_none() {
            let remediation = blocked_remediation(component);
            suggestions.extend(remediation);
            blocked_reason = Some(format!("matches blocked pattern: '{component}'"));
        }

        if gitops::is_gitops_command(component) {
            let gitops_result = gitops::validate_gitops_workflow(component, agent_name);
            if !gitops_result.allowed && blocked_reason.is_none() {
                blocked_reason = Some(gitops_result.reason.clone());
                suggestions.extend(gitops_result.suggestions.clone());
            }
            if gitops::requires_credentials(component) {
                requires_credentials = true;
            }
        }

        let tier = tiers::classify(component, has_blocked, &settings.safe_prefixes);
        if tier > effective_tier {
            effective_tier = tier;
        }
    }

    if let Some(reason) = blocked_reason {
        return PolicyResult {
            decision: Decision::Deny,
            effective_tier: SecurityTier::T3.max(effective_tier),
            reason,
            suggestions,
            requires_credentials,
        };
    }

    if settings.ask_patterns.any_match(command) || effective_tier == SecurityTier::T3 {
        return PolicyResult {
            decision: Decision::Ask,
            effective_tier,
            reason: "operation requires human approval".to_string(),
            suggestions,
            requires_credentials,
        };
    }

    if settings.allow_patterns.any_match(command) {
        return PolicyResult {
            decision: Decision::Allow,
            effective_tier,
            reason: "matches an allow pattern".to_string(),
            suggestions,
            requires_credentials,
        };
    }

    // Default-deny for anything not explicitly allowed below T3; T0-T2
    // operations with no matching allow rule still need an explicit nod,
    // mirroring the policy engine's default-deny closure.
    PolicyResult {
        decision: Decision::Deny,
        effective_tier,
        reason: "no matching allow rule".to_string(),
        suggestions,
        requires_credentials,
    }
}

fn blocked_remediation(component: &str) -> Vec<String> {
    if component.contains("kubectl delete") {
        vec!["use kubectl get + GitOps reconciliation".to_string()]
    } else if component.contains("terraform apply") {
        vec!["use terraform plan".to_string()]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PolicySettings {
        PolicySettings::new(
            vec!["Generated with".to_string()],
            &[r"kubectl\s+delete".to_string(), "terraform apply".to_string()],
            &[],
            &["git status".to_string()],
            vec!["git status".to_string(), "kubectl get".to_string()],
        )
    }

    #[test]
    fn s1_read_only_is_allowed() {
        let result = evaluate(&settings(), "git status", None);
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.effective_tier, SecurityTier::T0);
    }

    #[test]
    fn s2_compound_command_with_blocked_component_is_denied() {
        let result = evaluate(&settings(), "ls /tmp && terraform apply", None);
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.effective_tier, SecurityTier::T3);
        assert!(result.suggestions.iter().any(|s| s.contains("terraform plan")));
    }

    #[test]
    fn forbidden_footer_is_denied_before_anything_else() {
        let result = evaluate(&settings(), "git commit -m 'Generated with tool'", None);
        assert_eq!(result.decision, Decision::Deny);
    }

    #[test]
    fn t3_tier_requires_ask_even_without_ask_pattern() {
        let result = evaluate(&settings(), "rm -rf /var/data", None);
        assert_eq!(result.decision, Decision::Ask);
        assert_eq!(result.effective_tier, SecurityTier::T3);
    }

    #[test]
    fn gitops_apply_without_dry_run_denied_with_suggestion() {
        let result = evaluate(&settings(), "kubectl apply -f deploy.yaml", None);
        assert_eq!(result.decision, Decision::Deny);
        assert!(result
            .suggestions
            .iter()
            .any(|s| s.contains("--dry-run=client")));
    }

    #[test]
    fn gitops_commands_require_credentials() {
        let result = evaluate(&settings(), "kubectl get pods", None);
        assert!(result.requires_credentials);
    }
}
