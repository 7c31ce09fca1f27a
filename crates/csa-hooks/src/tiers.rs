//! Maps a single (already-decomposed) shell command to a [`SecurityTier`].
//!
//! Classification order, first match wins: empty -> T3, blocked pattern ->
//! T3, dry-run flag -> T2, T2 verb -> T2, T1 verb -> T1, safe read-only
//! prefix -> T0, otherwise T3 (default-deny).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use csa_core::SecurityTier;
use regex::Regex;

/// Commands common enough across sessions to skip the full pattern scan.
pub const ULTRA_COMMON_T0_COMMANDS: &[&str] = &[
    "ls", "pwd", "cat", "echo", "git status", "git diff", "git log", "git branch", "kubectl get",
];

const T1_PATTERNS: &[&str] = &[r"\bvalidate\b", r"\blint\b", r"\bcheck\b", r"\bfmt\b"];
const T2_PATTERNS: &[&str] = &[r"\bplan\b", r"\btemplate\b", r"\bdiff\b"];

const CACHE_CAPACITY: usize = 512;

/// Bounded cache keyed by `(command, has_blocked)`, evicting least recently
/// used entries once full.
struct TierCache {
    map: HashMap<(String, bool), SecurityTier>,
    order: VecDeque<(String, bool)>,
}

impl TierCache {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &(String, bool)) -> Option<SecurityTier> {
        if let Some(tier) = self.map.get(key).copied() {
            self.touch(key);
            Some(tier)
        } else {
            None
        }
    }

    fn touch(&mut self, key: &(String, bool)) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }

    fn insert(&mut self, key: (String, bool), tier: SecurityTier) {
        if !self.map.contains_key(&key) && self.map.len() >= CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.touch(&key);
        self.map.insert(key, tier);
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

static CACHE: Mutex<Option<TierCache>> = Mutex::new(None);

fn t1_regexes() -> &'static [Regex] {
    static RES: std::sync::OnceLock<Vec<Regex>> = std::sync::OnceLock::new();
    RES.get_or_init(|| {
        T1_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("valid T1 pattern"))
            .collect()
    })
}

fn t2_regexes() -> &'static [Regex] {
    static RES: std::sync::OnceLock<Vec<Regex>> = std::sync::OnceLock::new();
    RES.get_or_init(|| {
        T2_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("valid T2 pattern"))
            .collect()
    })
}

/// Best-effort read-only prefix check against the externally-configured
/// safe-command list (literal prefixes and safe multi-word prefixes such
/// as `kubectl get`, `terraform show`).
pub fn is_read_only_command(command: &str, safe_prefixes: &[String]) -> bool {
    safe_prefixes
        .iter()
        .any(|prefix| command == prefix || command.starts_with(&format!("{prefix} ")))
}

fn fast_path_t0(command: &str) -> bool {
    let words: Vec<&str> = command.split_whitespace().collect();
    if words.len() >= 2 {
        let prefix2 = format!("{} {}", words[0], words[1]);
        if ULTRA_COMMON_T0_COMMANDS.contains(&prefix2.as_str()) {
            return true;
        }
    }
    if let Some(first) = words.first() {
        if ULTRA_COMMON_T0_COMMANDS.contains(first) {
            return true;
        }
    }
    false
}

/// Classify a single command into a tier. `has_blocked` reflects whether
/// the Policy Engine already matched `command` against a blocked pattern;
/// classification and caching both key off that flag so a tier is never
/// cached for a command under the wrong blocked-pattern verdict.
pub fn classify(command: &str, has_blocked: bool, safe_prefixes: &[String]) -> SecurityTier {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return SecurityTier::T3;
    }

    let key = (trimmed.to_string(), has_blocked);
    {
        let mut guard = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        let cache = guard.get_or_insert_with(TierCache::new);
        if let Some(tier) = cache.get(&key) {
            return tier;
        }
    }

    let tier = classify_uncached(trimmed, has_blocked, safe_prefixes);

    let mut guard = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    guard.get_or_insert_with(TierCache::new).insert(key, tier);
    tier
}

fn classify_uncached(command: &str, has_blocked: bool, safe_prefixes: &[String]) -> SecurityTier {
    if fast_path_t0(command) {
        return SecurityTier::T0;
    }
    if has_blocked {
        return SecurityTier::T3;
    }
    if command.contains("--dry-run") || command.contains("--plan-only") {
        return SecurityTier::T2;
    }
    if t2_regexes().iter().any(|re| re.is_match(command)) {
        return SecurityTier::T2;
    }
    if t1_regexes().iter().any(|re| re.is_match(command)) {
        return SecurityTier::T1;
    }
    if is_read_only_command(command, safe_prefixes) {
        return SecurityTier::T0;
    }
    SecurityTier::T3
}

/// Number of entries currently cached. Exposed for tests and diagnostics.
pub fn cache_len() -> usize {
    CACHE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .map(TierCache::len)
        .unwrap_or(0)
}

/// Effective tier of a compound command: the maximum tier across its
/// already-decomposed components.
pub fn effective_tier(component_tiers: impl IntoIterator<Item = SecurityTier>) -> SecurityTier {
    component_tiers
        .into_iter()
        .max()
        .unwrap_or(SecurityTier::T3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn safe_prefixes() -> Vec<String> {
        vec!["terraform show".to_string(), "kubectl get".to_string()]
    }

    #[test]
    fn empty_command_is_t3() {
        assert_eq!(classify("", false, &safe_prefixes()), SecurityTier::T3);
        assert_eq!(classify("   ", false, &safe_prefixes()), SecurityTier::T3);
    }

    #[test]
    fn ultra_common_fast_path_is_t0() {
        assert_eq!(classify("ls", false, &[]), SecurityTier::T0);
        assert_eq!(classify("git status", false, &[]), SecurityTier::T0);
    }

    #[test]
    fn blocked_pattern_forces_t3() {
        assert_eq!(
            classify("kubectl apply -f x.yaml", true, &safe_prefixes()),
            SecurityTier::T3
        );
    }

    #[test]
    fn dry_run_flag_is_t2() {
        assert_eq!(
            classify("terraform apply --dry-run", false, &safe_prefixes()),
            SecurityTier::T2
        );
    }

    #[test]
    fn t2_verb_is_t2() {
        assert_eq!(classify("terraform plan", false, &safe_prefixes()), SecurityTier::T2);
    }

    #[test]
    fn t1_verb_is_t1() {
        assert_eq!(classify("terraform validate", false, &safe_prefixes()), SecurityTier::T1);
    }

    #[test]
    fn safe_prefix_is_t0() {
        assert_eq!(classify("kubectl get pods", false, &safe_prefixes()), SecurityTier::T0);
    }

    #[test]
    fn unknown_command_defaults_t3() {
        assert_eq!(classify("rm -rf /", false, &[]), SecurityTier::T3);
    }

    #[test]
    fn effective_tier_is_max_of_components() {
        let tiers = vec![SecurityTier::T0, SecurityTier::T3, SecurityTier::T1];
        assert_eq!(effective_tier(tiers), SecurityTier::T3);
    }

    #[test]
    fn cache_is_bounded() {
        for i in 0..(CACHE_CAPACITY + 50) {
            classify(&format!("echo unique-command-{i}"), false, &[]);
        }
        assert!(cache_len() <= CACHE_CAPACITY);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn tier_strategy() -> impl Strategy<Value = SecurityTier> {
        prop_oneof![
            Just(SecurityTier::T0),
            Just(SecurityTier::T1),
            Just(SecurityTier::T2),
            Just(SecurityTier::T3),
        ]
    }

    proptest! {
        /// `effective_tier` of any non-empty set of component tiers is
        /// always their true maximum, never merely the last one seen.
        #[test]
        fn effective_tier_is_always_the_maximum(tiers in prop::collection::vec(tier_strategy(), 1..10)) {
            let expected = tiers.iter().copied().max().unwrap();
            prop_assert_eq!(effective_tier(tiers), expected);
        }

        /// Classification never panics on arbitrary command text.
        #[test]
        fn classify_never_panics(command in ".{0,120}", has_blocked in any::<bool>()) {
            let _ = classify(&command, has_blocked, &[]);
        }
    }
}
