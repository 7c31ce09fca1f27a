//! Context Provisioner (spec §4.11): builds the Agent Contract for a
//! routed agent from the project context document, enriching it with
//! contextually-similar sections without ever dropping a required one.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{Map, Value, json};

/// `{contract, enrichment, metadata}` payload handed to a sub-agent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentContract {
    pub contract: Map<String, Value>,
    pub enrichment: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl AgentContract {
    pub fn to_payload(&self) -> Value {
        json!({
            "contract": self.contract,
            "enrichment": self.enrichment,
            "metadata": self.metadata,
        })
    }
}

/// Provision an Agent Contract for `agent_name`. `required_sections`
/// comes from the agent's declared contract (see [`crate::router::AgentDeclaration`]);
/// `context_doc` is the externally-owned `project-context.json` document.
///
/// Returns the missing section names when any required section is
/// absent or null in `context_doc.sections` — phase 2's guard failure.
pub fn provision_context(
    agent_name: &str,
    user_task: &str,
    required_sections: &[String],
    context_doc: &Value,
) -> Result<AgentContract, Vec<String>> {
    let sections = context_doc.get("sections").and_then(Value::as_object);

    let mut missing = Vec::new();
    let mut contract = Map::new();
    for section in required_sections {
        match sections.and_then(|s| s.get(section)) {
            Some(value) if !value.is_null() => {
                contract.insert(section.clone(), value.clone());
            }
            _ => missing.push(section.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }

    let enrichment = sections
        .map(|sections| semantic_enrichment(sections, required_sections, user_task))
        .unwrap_or_default();

    let metadata = Map::from_iter([
        ("agent_type".to_string(), Value::String(agent_name.to_string())),
        ("timestamp".to_string(), Value::String(Utc::now().to_rfc3339())),
    ]);

    Ok(AgentContract { contract, enrichment, metadata })
}

fn task_words(task: &str) -> HashSet<String> {
    task.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase()).collect()
}

/// Keyword-match enrichment: section names outside the required set
/// whose key (or, for `application_services`, whose entries' `name`)
/// appears in the task text get folded in.
fn semantic_enrichment(
    sections: &Map<String, Value>,
    required_sections: &[String],
    user_task: &str,
) -> Map<String, Value> {
    let required: HashSet<&String> = required_sections.iter().collect();
    let words = task_words(user_task);
    let task_lower = user_task.to_ascii_lowercase();

    let mut enrichment = Map::new();
    for (key, value) in sections {
        if required.contains(key) {
            continue;
        }
        if words.contains(&key.to_ascii_lowercase()) {
            enrichment.insert(key.clone(), value.clone());
        }
    }

    if !required.contains(&"application_services".to_string()) {
        if let Some(Value::Array(services)) = sections.get("application_services") {
            let matched: Vec<Value> = services
                .iter()
                .filter(|svc| {
                    svc.get("name")
                        .and_then(Value::as_str)
                        .map(|name| task_lower.contains(&name.to_ascii_lowercase()))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            if !matched.is_empty() {
                enrichment.insert("application_services".to_string(), Value::Array(matched));
            }
        }
    }

    enrichment
}
