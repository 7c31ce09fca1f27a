//! Content-hash deduplication key (spec §3): 12-hex prefix of SHA-256
//! over `{section, change}`, so two discoveries proposing the same
//! change collapse into one pending update.

use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn compute(target_section: &str, proposed_change: &Value) -> String {
    let canonical = serde_json::json!({
        "section": target_section,
        "change": proposed_change,
    });
    let bytes = serde_json::to_vec(&canonical).expect("json values always serialize");
    let digest = Sha256::digest(&bytes);
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}
