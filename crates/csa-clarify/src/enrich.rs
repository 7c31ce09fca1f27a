//! Cleaning answers and enriching the original prompt (spec §4.9 step 6).

use crate::options::ALL_SENTINEL;

/// Strip a leading emoji/symbol prefix (anything up to and including the
/// first run of whitespace that follows a non-ASCII lead character) and
/// the "Todos / All" sentinel text, leaving a plain answer string.
pub fn clean_answer(answer: &str) -> String {
    let trimmed = answer.trim();
    if trimmed == ALL_SENTINEL || trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("todos") {
        return "all".to_string();
    }

    let without_emoji: String = {
        let mut out = String::new();
        let mut skipping_prefix = true;
        for c in trimmed.chars() {
            if skipping_prefix {
                if !c.is_ascii() || c.is_whitespace() {
                    if c.is_whitespace() {
                        skipping_prefix = false;
                    }
                    continue;
                }
                // First ASCII, non-whitespace char: no emoji prefix present.
                skipping_prefix = false;
                out.push(c);
            } else {
                out.push(c);
            }
        }
        if out.is_empty() { trimmed.to_string() } else { out }
    };

    without_emoji.trim().to_string()
}

/// Append `\n\n[Clarification - <type>: <clean_answer>, ...]` to the
/// original prompt for every `(entity_type, raw_answer)` pair.
pub fn enrich_prompt(original_prompt: &str, clarifications: &[(String, String)]) -> String {
    if clarifications.is_empty() {
        return original_prompt.to_string();
    }
    let joined = clarifications
        .iter()
        .map(|(entity_type, raw_answer)| format!("{entity_type}: {}", clean_answer(raw_answer)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{original_prompt}\n\n[Clarification - {joined}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_answer_strips_emoji_prefix() {
        assert_eq!(clean_answer("\u{1F4E6} tcm-api"), "tcm-api");
    }

    #[test]
    fn clean_answer_normalizes_all_sentinel() {
        assert_eq!(clean_answer(ALL_SENTINEL), "all");
    }

    #[test]
    fn clean_answer_leaves_plain_text_alone() {
        assert_eq!(clean_answer("tcm-api"), "tcm-api");
    }

    #[test]
    fn enrich_prompt_appends_clarification_block() {
        let enriched = enrich_prompt(
            "check the API",
            &[("service".to_string(), "\u{1F4E6} tcm-api".to_string())],
        );
        assert_eq!(enriched, "check the API\n\n[Clarification - service: tcm-api]");
    }

    #[test]
    fn enrich_prompt_is_identity_with_no_clarifications() {
        assert_eq!(enrich_prompt("hello", &[]), "hello");
    }
}
