//! Layer A — payload validation. Agnostic to the agent being invoked:
//! checks the shape of the Agent Contract payload before anything in
//! the pipeline touches the filesystem or a sub-agent.

use std::path::Path;

use serde_json::Value;

/// Outcome of validating one agent invocation payload.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// The last check attempted: `"A1"`..`"A5"`, or `"complete"` when
    /// every check passed.
    pub phase_reached: &'static str,
    pub valid_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn fail(phase: &'static str, error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            phase_reached: phase,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// Validate a payload `{contract, enrichment?, metadata}` against the
/// set of contract fields a given agent declares mandatory.
///
/// `infrastructure_path_fields` names the dotted paths under `contract`
/// (e.g. `"infrastructure_paths"`) whose string values must resolve to
/// an existing directory, or to a file whose parent directory exists.
pub fn validate_payload(
    payload: &Value,
    contract_required_fields: &[&str],
    infrastructure_path_fields: &[&str],
) -> ValidationResult {
    // A1: payload is a map.
    let Some(root) = payload.as_object() else {
        return ValidationResult::fail("A1", "payload is not a JSON object");
    };

    let contract = match root.get("contract") {
        Some(Value::Object(map)) => map,
        Some(_) => return ValidationResult::fail("A1", "'contract' is not a JSON object"),
        None => return ValidationResult::fail("A2", "payload is missing 'contract'"),
    };

    // A2: all declared contract fields present and non-null.
    let mut valid_fields = Vec::new();
    let mut missing_fields = Vec::new();
    for field in contract_required_fields {
        match contract.get(*field) {
            Some(Value::Null) | None => missing_fields.push(field.to_string()),
            Some(_) => valid_fields.push(field.to_string()),
        }
    }
    if !missing_fields.is_empty() {
        return ValidationResult {
            is_valid: false,
            phase_reached: "A2",
            valid_fields,
            missing_fields: missing_fields.clone(),
            errors: vec![format!("missing required contract fields: {}", missing_fields.join(", "))],
            warnings: Vec::new(),
        };
    }

    // A3: every infrastructure path exists on disk (dir, or file with an
    // existing parent).
    let mut errors = Vec::new();
    for field in infrastructure_path_fields {
        for path in paths_in_field(contract.get(*field)) {
            if !path_is_reachable(&path) {
                errors.push(format!("infrastructure path does not exist: {path}"));
            }
        }
    }
    if !errors.is_empty() {
        return ValidationResult {
            is_valid: false,
            phase_reached: "A3",
            valid_fields,
            missing_fields,
            errors,
            warnings: Vec::new(),
        };
    }

    // A4: enrichment fields, when present, are non-null. Absence is a
    // warning only.
    let mut warnings = Vec::new();
    match root.get("enrichment") {
        None => warnings.push("payload has no enrichment section".to_string()),
        Some(Value::Object(enrichment)) => {
            for (key, value) in enrichment {
                if value.is_null() {
                    return ValidationResult {
                        is_valid: false,
                        phase_reached: "A4",
                        valid_fields,
                        missing_fields,
                        errors: vec![format!("enrichment field '{key}' is null")],
                        warnings,
                    };
                }
            }
        }
        Some(_) => {
            return ValidationResult {
                is_valid: false,
                phase_reached: "A4",
                valid_fields,
                missing_fields,
                errors: vec!["'enrichment' is not a JSON object".to_string()],
                warnings,
            };
        }
    }

    // A5: metadata coherence — agent_type and timestamp must be present,
    // non-null, and the timestamp must parse as RFC 3339.
    match root.get("metadata") {
        Some(Value::Object(metadata)) => {
            match metadata.get("agent_type") {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => {
                    return ValidationResult {
                        is_valid: false,
                        phase_reached: "A5",
                        valid_fields,
                        missing_fields,
                        errors: vec!["metadata.agent_type is missing or empty".to_string()],
                        warnings,
                    };
                }
            }
            match metadata.get("timestamp") {
                Some(Value::String(s)) if chrono::DateTime::parse_from_rfc3339(s).is_ok() => {}
                _ => {
                    return ValidationResult {
                        is_valid: false,
                        phase_reached: "A5",
                        valid_fields,
                        missing_fields,
                        errors: vec!["metadata.timestamp is missing or not RFC 3339".to_string()],
                        warnings,
                    };
                }
            }
        }
        _ => {
            return ValidationResult {
                is_valid: false,
                phase_reached: "A5",
                valid_fields,
                missing_fields,
                errors: vec!["payload is missing a 'metadata' object".to_string()],
                warnings,
            };
        }
    }

    ValidationResult {
        is_valid: true,
        phase_reached: "complete",
        valid_fields,
        missing_fields,
        errors: Vec::new(),
        warnings,
    }
}

fn paths_in_field(field: Option<&Value>) -> Vec<String> {
    match field {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

fn path_is_reachable(path: &str) -> bool {
    let p = Path::new(path);
    if p.is_dir() {
        return true;
    }
    p.parent().map(Path::exists).unwrap_or(false)
}
