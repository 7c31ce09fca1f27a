//! Clarification Engine (spec §4.9): detects ambiguity in a free-text
//! prompt against project-context entities, asks a structured question
//! set through the external questioner, and enriches the prompt with the
//! answers.

pub mod ask;
pub mod enrich;
pub mod entities;
pub mod options;
pub mod score;

pub use ask::{AskOption, AskQuestion, AskResponse, Answer, FirstOptionQuestioner, Questioner};
pub use entities::EntityType;

use serde_json::Value;

const DEFAULT_THRESHOLD: f64 = 30.0;
const READ_ONLY_THRESHOLD: f64 = 50.0;

const READ_ONLY_VERBS: &[&str] = &["show", "get", "list", "view", "ver", "mostrar"];

/// Result of one clarification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarifyResult {
    pub enriched_prompt: String,
    pub occurred: bool,
}

fn is_slash_command(prompt: &str) -> bool {
    prompt.trim_start().starts_with('/')
}

fn starts_with_read_only_verb(prompt: &str) -> bool {
    let lower = prompt.trim().to_lowercase();
    READ_ONLY_VERBS
        .iter()
        .any(|verb| lower == *verb || lower.starts_with(&format!("{verb} ")))
}

fn current_environment(context_doc: &Value) -> Option<String> {
    context_doc
        .get("sections")
        .and_then(|s| s.get("project_details"))
        .and_then(|p| p.get("environment"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Run the clarification algorithm (spec §4.9 steps 1-6) against
/// `prompt`, asking `questioner` when ambiguity clears the threshold.
pub fn clarify(
    prompt: &str,
    context_doc: &Value,
    questioner: &dyn Questioner,
) -> ClarifyResult {
    if is_slash_command(prompt) {
        return ClarifyResult { enriched_prompt: prompt.to_string(), occurred: false };
    }

    let threshold = if starts_with_read_only_verb(prompt) {
        READ_ONLY_THRESHOLD
    } else {
        DEFAULT_THRESHOLD
    };

    let known_names_by_entity: Vec<(EntityType, Vec<String>)> = [
        EntityType::Service,
        EntityType::Namespace,
        EntityType::Cluster,
        EntityType::Environment,
        EntityType::Resource,
    ]
    .into_iter()
    .map(|entity| (entity, options::real_options(entity, context_doc)))
    .collect();

    let env = current_environment(context_doc);
    let signals = score::detect_signals(prompt, &known_names_by_entity, env.as_deref());
    let ambiguity = score::ambiguity_score(&signals);

    if ambiguity <= threshold {
        return ClarifyResult { enriched_prompt: prompt.to_string(), occurred: false };
    }

    let mut entities_in_order: Vec<EntityType> = Vec::new();
    for signal in &signals {
        if !entities_in_order.contains(&signal.entity) {
            entities_in_order.push(signal.entity);
        }
    }

    let mut questions = Vec::new();
    let mut question_entities = Vec::new();
    for entity in &entities_in_order {
        let Some(real_opts) = options::options_for(*entity, context_doc) else {
            continue;
        };
        let options = real_opts
            .into_iter()
            .map(|label| AskOption { label, description: String::new() })
            .collect();
        questions.push(AskQuestion {
            question: format!("Which {}?", entity.as_str()),
            header: entity.as_str().to_string(),
            options,
            multi_select: false,
        });
        question_entities.push(*entity);
    }

    if questions.is_empty() {
        return ClarifyResult { enriched_prompt: prompt.to_string(), occurred: false };
    }

    let response = questioner.ask(&questions);

    let mut clarifications = Vec::new();
    for (idx, entity) in question_entities.iter().enumerate() {
        let key = format!("question_{}", idx + 1);
        if let Some(answer) = response.answers.get(&key) {
            if let Some(label) = answer.first_label() {
                clarifications.push((entity.as_str().to_string(), label.to_string()));
            }
        }
    }

    let enriched_prompt = enrich::enrich_prompt(prompt, &clarifications);
    ClarifyResult { enriched_prompt, occurred: !clarifications.is_empty() }
}
