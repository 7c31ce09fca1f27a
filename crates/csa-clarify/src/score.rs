//! Ambiguity scoring (spec §4.9 step 2): the weighted average of the
//! top-3 detected pattern weights out of all entity and environment-
//! mismatch signals found in the prompt.

use crate::entities::{self, EntityType};

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSignal {
    pub entity: EntityType,
    pub weight: f64,
    /// True when this signal is the environment-mismatch variant rather
    /// than a plain "environment mentioned" signal.
    pub is_env_mismatch: bool,
}

/// Entities whose keyword family matched AND are not already resolved by
/// a specifically-named option in `known_names_by_entity`, plus an
/// environment-mismatch signal when applicable.
pub fn detect_signals(
    prompt: &str,
    known_names_by_entity: &[(EntityType, Vec<String>)],
    current_environment: Option<&str>,
) -> Vec<DetectedSignal> {
    let mut signals = Vec::new();

    for entity in entities::detect_entities(prompt) {
        // Plain environment mentions are not ambiguity signals on their
        // own -- only a mismatch against the context's current
        // environment is (handled below, weight 90).
        if entity == EntityType::Environment {
            continue;
        }
        let known = known_names_by_entity
            .iter()
            .find(|(e, _)| *e == entity)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[]);
        if entities::names_specific_entity(prompt, known) {
            continue;
        }
        signals.push(DetectedSignal {
            entity,
            weight: entity.weight(),
            is_env_mismatch: false,
        });
    }

    if entities::environment_mismatch(prompt, current_environment) {
        signals.push(DetectedSignal {
            entity: EntityType::Environment,
            weight: 90.0,
            is_env_mismatch: true,
        });
    }

    signals
}

/// Weighted average of the top-3 signal weights (by weight, descending).
/// Zero if no signals were detected.
pub fn ambiguity_score(signals: &[DetectedSignal]) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    let mut weights: Vec<f64> = signals.iter().map(|s| s.weight).collect();
    weights.sort_by(|a, b| b.partial_cmp(a).unwrap());
    weights.truncate(3);
    weights.iter().sum::<f64>() / weights.len() as f64
}
