//! Ambiguity detection: fixed keyword families matched against a prompt to
//! decide which entity types (service, namespace, cluster, environment,
//! resource) are ambiguously referenced (spec §4.9 step 1).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Service,
    Namespace,
    Cluster,
    Environment,
    Resource,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Namespace => "namespace",
            Self::Cluster => "cluster",
            Self::Environment => "environment",
            Self::Resource => "resource",
        }
    }

    /// Ambiguity weight used when this entity type is detected (spec §4.9
    /// step 2). Environment-mismatch detection uses its own 90 weight,
    /// handled separately from the plain "environment mentioned" case.
    pub fn weight(self) -> f64 {
        match self {
            Self::Service => 80.0,
            Self::Environment => 90.0,
            Self::Namespace => 60.0,
            Self::Resource => 70.0,
            Self::Cluster => 60.0,
        }
    }
}

/// Keyword families that signal an ambiguous reference to an entity type.
/// Fixed per spec: the English and Spanish phrasings the source project
/// actually used ("the API", "el servicio", ...).
fn keyword_families() -> &'static [(EntityType, &'static [&'static str])] {
    static FAMILIES: OnceLock<Vec<(EntityType, &'static [&'static str])>> = OnceLock::new();
    FAMILIES.get_or_init(|| {
        vec![
            (
                EntityType::Service,
                &["the api", "el servicio", "the service", "el api", "la api"] as &[&str],
            ),
            (EntityType::Namespace, &["namespace", "el namespace"]),
            (EntityType::Cluster, &["cluster", "el cluster"]),
            (
                EntityType::Environment,
                &["prod", "production", "staging", "dev", "environment", "ambiente"],
            ),
            (
                EntityType::Resource,
                &["redis instance", "the instance", "la instancia", "resource"],
            ),
        ]
    })
}

fn word_boundary_regex(phrase: &str) -> Regex {
    let escaped = regex::escape(phrase);
    Regex::new(&format!(r"(?i)\b{escaped}\b")).expect("escaped phrase is always valid regex")
}

/// True if `prompt` contains a word-boundary match for any keyword in
/// `entity`'s family.
pub fn matches_entity(prompt: &str, entity: EntityType) -> bool {
    keyword_families()
        .iter()
        .find(|(e, _)| *e == entity)
        .map(|(_, phrases)| phrases.iter().any(|p| word_boundary_regex(p).is_match(prompt)))
        .unwrap_or(false)
}

/// Entity types whose keyword family matches somewhere in the prompt.
pub fn detect_entities(prompt: &str) -> Vec<EntityType> {
    [
        EntityType::Service,
        EntityType::Namespace,
        EntityType::Cluster,
        EntityType::Environment,
        EntityType::Resource,
    ]
    .into_iter()
    .filter(|entity| matches_entity(prompt, *entity))
    .collect()
}

/// True if the prompt already names one specific option for `entity` from
/// `known_names` (case-insensitive substring), meaning that entity type is
/// NOT ambiguous even though its keyword family matched.
pub fn names_specific_entity(prompt: &str, known_names: &[String]) -> bool {
    let lower = prompt.to_lowercase();
    known_names.iter().any(|name| lower.contains(&name.to_lowercase()))
}

/// True if the prompt references an environment different from the one
/// the context document says is current (spec §4.9 step 2, weight 90).
pub fn environment_mismatch(prompt: &str, current_environment: Option<&str>) -> bool {
    const ENVIRONMENTS: &[&str] = &["prod", "production", "staging", "dev", "development", "test"];
    let Some(current) = current_environment else {
        return false;
    };
    let lower_prompt = prompt.to_lowercase();
    let lower_current = current.to_lowercase();
    ENVIRONMENTS.iter().any(|env| {
        word_boundary_regex(env).is_match(&lower_prompt) && !lower_current.contains(env)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_service_signal() {
        assert!(matches_entity("check the API", EntityType::Service));
    }

    #[test]
    fn detects_spanish_service_signal() {
        assert!(matches_entity("revisa el servicio", EntityType::Service));
    }

    #[test]
    fn no_match_for_unrelated_prompt() {
        assert!(!matches_entity("run the tests", EntityType::Service));
    }

    #[test]
    fn named_entity_is_not_ambiguous() {
        let known = vec!["tcm-api".to_string(), "pg-api".to_string()];
        assert!(names_specific_entity("deploy tcm-api now", &known));
        assert!(!names_specific_entity("deploy the service now", &known));
    }

    #[test]
    fn environment_mismatch_detects_different_env() {
        assert!(environment_mismatch("deploy to staging", Some("production")));
        assert!(!environment_mismatch("deploy to production", Some("production")));
        assert!(!environment_mismatch("deploy the service", Some("production")));
    }
}
