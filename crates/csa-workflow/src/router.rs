//! Agent Router (spec §4.10): picks a sub-agent for an enriched prompt
//! by scoring it against each agent's declared domain keywords.

use std::collections::HashSet;

use csa_core::SecurityTier;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The routing score floor below which phase 1's guard fails.
pub const MIN_ROUTING_CONFIDENCE: f64 = 0.5;

/// One sub-agent's declared routing and contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDeclaration {
    pub name: String,
    pub domains: Vec<String>,
    pub security_tiers_supported: Vec<SecurityTier>,
    pub required_context_sections: Vec<String>,
    pub skills: Vec<String>,
}

impl AgentDeclaration {
    pub fn new(name: impl Into<String>, domains: &[&str], required_context_sections: &[&str]) -> Self {
        Self {
            name: name.into(),
            domains: domains.iter().map(|s| s.to_string()).collect(),
            security_tiers_supported: vec![SecurityTier::T0, SecurityTier::T1, SecurityTier::T2, SecurityTier::T3],
            required_context_sections: required_context_sections.iter().map(|s| s.to_string()).collect(),
            skills: Vec::new(),
        }
    }
}

/// The five standard agents named in the original context provider:
/// `terraform-architect`, `gitops-operator`, `gcp-troubleshooter`,
/// `aws-troubleshooter`, `devops-developer`.
pub fn standard_agents() -> Vec<AgentDeclaration> {
    vec![
        AgentDeclaration::new(
            "terraform-architect",
            &["terraform", "infrastructure", "provision", "resource", "module", "state", "plan", "apply"],
            &["project_details", "terraform_infrastructure", "operational_guidelines"],
        ),
        AgentDeclaration::new(
            "gitops-operator",
            &["gitops", "flux", "helm", "kustomize", "kustomization", "reconcile", "helmrelease", "deploy"],
            &["project_details", "gitops_configuration", "cluster_details"],
        ),
        AgentDeclaration::new(
            "gcp-troubleshooter",
            &["gcp", "gke", "google cloud", "cloud run", "bigquery", "troubleshoot"],
            &["project_details", "cluster_details"],
        ),
        AgentDeclaration::new(
            "aws-troubleshooter",
            &["aws", "ec2", "eks", "s3", "lambda", "troubleshoot"],
            &["project_details", "cluster_details"],
        ),
        AgentDeclaration::new(
            "devops-developer",
            &["ci", "cd", "pipeline", "build", "application", "service", "develop"],
            &["project_details", "operational_guidelines"],
        ),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingResult {
    pub agent_name: String,
    pub confidence: f64,
}

fn normalize_words(text: &str) -> HashSet<String> {
    let re = Regex::new(r"[a-z0-9]+").unwrap();
    re.find_iter(&text.to_ascii_lowercase()).map(|m| m.as_str().to_string()).collect()
}

/// Score one agent against a prompt: the fraction of its declared domain
/// keywords that appear (word-boundary for single words, substring for
/// phrases) in the prompt.
fn score_agent(prompt_lower: &str, prompt_words: &HashSet<String>, agent: &AgentDeclaration) -> f64 {
    if agent.domains.is_empty() {
        return 0.0;
    }
    let matches = agent
        .domains
        .iter()
        .filter(|domain| {
            if domain.contains(' ') {
                prompt_lower.contains(domain.as_str())
            } else {
                prompt_words.contains(domain)
            }
        })
        .count();
    matches as f64 / agent.domains.len() as f64
}

/// Pick the highest-scoring agent for `enriched_prompt`. Returns `None`
/// when no agent clears [`MIN_ROUTING_CONFIDENCE`].
pub fn route(enriched_prompt: &str, agents: &[AgentDeclaration]) -> Option<RoutingResult> {
    let prompt_lower = enriched_prompt.to_ascii_lowercase();
    let prompt_words = normalize_words(enriched_prompt);

    let best = agents
        .iter()
        .map(|agent| (agent, score_agent(&prompt_lower, &prompt_words, agent)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    if best.1 < MIN_ROUTING_CONFIDENCE {
        return None;
    }
    Some(RoutingResult { agent_name: best.0.name.clone(), confidence: best.1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_terraform_prompt_to_terraform_architect() {
        let agents = standard_agents();
        let result = route("please run terraform plan to provision the new module", &agents).unwrap();
        assert_eq!(result.agent_name, "terraform-architect");
        assert!(result.confidence >= MIN_ROUTING_CONFIDENCE);
    }

    #[test]
    fn routes_gitops_prompt_to_gitops_operator() {
        let agents = standard_agents();
        let result = route("reconcile the flux helmrelease for the gitops deploy", &agents).unwrap();
        assert_eq!(result.agent_name, "gitops-operator");
    }

    #[test]
    fn low_confidence_prompt_fails_to_route() {
        let agents = standard_agents();
        assert!(route("hello there", &agents).is_none());
    }
}
