//! ID generation for episodes, pending updates, and session-scoped agent
//! handles. None of these need to be globally unguessable, only unique
//! within a store; we derive the hex suffix from wall-clock time, process
//! id, and a per-process counter rather than pulling in a UUID crate.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// 8 lowercase hex characters, unique per call within this process.
pub fn random_hex() -> String {
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// `ep_<yyyymmdd_HHMMSS>_<8hex>`
pub fn episode_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("ep_{stamp}_{}", random_hex())
}

/// `pu_<yyyymmdd_HHMMSS>_<8hex>`
pub fn update_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("pu_{stamp}_{}", random_hex())
}

/// `agent-<yyyymmdd-HHMMSS>-<8hex>`
pub fn session_agent_id() -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    format!("agent-{stamp}-{}", random_hex())
}
