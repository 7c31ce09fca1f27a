//! Building the option list for one ambiguous entity type from the
//! project context document (spec §4.9 step 4).

use serde_json::Value;

use crate::entities::EntityType;

/// "Todos / All" synthetic option shown once a real option list exceeds
/// three entries, letting the user pick everything instead of one item.
pub const ALL_SENTINEL: &str = "\u{1F4E6} Todos / All";

/// JSON pointer path (as a sequence of map-keys/array-wildcards) each
/// entity type's real option names are read from, per spec's worked
/// example (`sections.application_services[*].name`). Other entity types
/// follow the same `sections.<section>[*].name` shape against the
/// section that plausibly enumerates them.
fn section_for(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Service => "application_services",
        EntityType::Namespace => "cluster_details",
        EntityType::Cluster => "cluster_details",
        EntityType::Environment => "project_details",
        EntityType::Resource => "infrastructure_topology",
    }
}

/// Read `sections.<section>[*].name` out of the context document, in
/// document order, deduplicated.
pub fn real_options(entity: EntityType, context_doc: &Value) -> Vec<String> {
    let section = context_doc
        .get("sections")
        .and_then(|s| s.get(section_for(entity)));

    let Some(section) = section else {
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut push_name = |value: &Value| {
        if let Some(name) = value.get("name").and_then(Value::as_str) {
            if !names.contains(&name.to_string()) {
                names.push(name.to_string());
            }
        }
    };

    match section {
        Value::Array(items) => items.iter().for_each(push_name),
        Value::Object(map) => map.values().for_each(push_name),
        _ => {}
    }
    names
}

/// Final option set for one entity: real options plus, when there are
/// more than 3, the "All" sentinel appended. `None` when the entity
/// should be skipped (<=1 option after filtering).
pub fn options_for(entity: EntityType, context_doc: &Value) -> Option<Vec<String>> {
    let mut options = real_options(entity, context_doc);
    if options.len() <= 1 {
        return None;
    }
    if options.len() > 3 {
        options.push(ALL_SENTINEL.to_string());
    }
    Some(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_real_options_from_application_services() {
        let doc = json!({
            "sections": {
                "application_services": [
                    {"name": "tcm-api"}, {"name": "pg-api"}, {"name": "bot"}
                ]
            }
        });
        let options = real_options(EntityType::Service, &doc);
        assert_eq!(options, vec!["tcm-api", "pg-api", "bot"]);
    }

    #[test]
    fn adds_all_sentinel_when_more_than_three() {
        let doc = json!({
            "sections": {
                "application_services": [
                    {"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}
                ]
            }
        });
        let options = options_for(EntityType::Service, &doc).unwrap();
        assert_eq!(options.last().unwrap(), ALL_SENTINEL);
        assert_eq!(options.len(), 5);
    }

    #[test]
    fn skips_entity_with_one_or_fewer_options() {
        let doc = json!({"sections": {"application_services": [{"name": "only-one"}]}});
        assert!(options_for(EntityType::Service, &doc).is_none());
    }

    #[test]
    fn skips_entity_with_no_section() {
        let doc = json!({"sections": {}});
        assert!(options_for(EntityType::Service, &doc).is_none());
    }
}
