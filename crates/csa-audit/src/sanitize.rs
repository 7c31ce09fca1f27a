//! Parameter sanitization and output hashing for audit records (spec §4.5).

use sha2::{Digest, Sha256};

/// Keys replaced with `[REDACTED]` wherever they appear in a parameter map,
/// case-insensitively.
const SENSITIVE_KEYS: &[&str] = &["password", "secret", "token", "key", "credential", "auth"];

const MAX_STRING_LEN: usize = 500;
const TRUNCATION_MARKER: &str = "...[truncated]";

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| lower.contains(s))
}

/// Recursively sanitize a JSON value: redact sensitive keys in objects and
/// truncate long string values. Arrays and nested objects are walked.
pub fn sanitize_params(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if is_sensitive_key(k) {
                    out.insert(k.clone(), serde_json::Value::String("[REDACTED]".to_string()));
                } else {
                    out.insert(k.clone(), sanitize_params(v));
                }
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sanitize_params).collect())
        }
        serde_json::Value::String(s) => serde_json::Value::String(truncate_string(s)),
        other => other.clone(),
    }
}

fn truncate_string(s: &str) -> String {
    if s.chars().count() > MAX_STRING_LEN {
        let head: String = s.chars().take(MAX_STRING_LEN).collect();
        format!("{head}{TRUNCATION_MARKER}")
    } else {
        s.to_string()
    }
}

/// SHA-256 of the first 1000 characters of `output`, 16-hex prefix.
pub fn hash_output(output: &str) -> String {
    let prefix: String = output.chars().take(1000).collect();
    let digest = Sha256::digest(prefix.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// First N characters of output, for the `output_preview` audit field.
pub fn output_preview(output: &str, max_chars: usize) -> String {
    if output.chars().count() > max_chars {
        let head: String = output.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        output.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_keys() {
        let input = json!({"username": "bob", "password": "hunter2", "AuthToken": "xyz"});
        let out = sanitize_params(&input);
        assert_eq!(out["username"], "bob");
        assert_eq!(out["password"], "[REDACTED]");
        assert_eq!(out["AuthToken"], "[REDACTED]");
    }

    #[test]
    fn redacts_nested_sensitive_keys() {
        let input = json!({"outer": {"secret_value": "s3cr3t"}});
        let out = sanitize_params(&input);
        assert_eq!(out["outer"]["secret_value"], "[REDACTED]");
    }

    #[test]
    fn truncates_long_strings() {
        let long = "a".repeat(600);
        let input = json!({"note": long});
        let out = sanitize_params(&input);
        let note = out["note"].as_str().unwrap();
        assert!(note.len() < 600);
        assert!(note.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn hash_output_is_16_hex_chars() {
        let hash = hash_output("some command output");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_output_only_considers_first_1000_chars() {
        let a = "x".repeat(1000) + "AAAA";
        let b = "x".repeat(1000) + "BBBB";
        assert_eq!(hash_output(&a), hash_output(&b));
    }
}
