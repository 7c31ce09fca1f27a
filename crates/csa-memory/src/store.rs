//! On-disk Episode Store: a canonical JSON file per episode, an
//! append-only JSONL audit trail, and a trimmed secondary index. Canonical
//! writes go through a temp-file-then-rename so a reader never observes a
//! half-written file; the JSONL trail is a single append write per record.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use csa_core::AppError;
use csa_lock::SessionLock;
use serde_json::Value;
use tracing::warn;

use crate::episode::{Episode, Outcome, Relationship, RelationshipKind};
use crate::index::{EpisodeIndex, IndexEntry};

/// Cross-process exclusive lock timeout for an index read-modify-write
/// (spec §5: shared stores require an exclusive advisory lock).
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EpisodeStore {
    root: PathBuf,
}

impl EpisodeStore {
    /// `root` is the episodic-memory directory (spec: `project-context/episodic-memory/`).
    pub fn new(root: PathBuf) -> Result<Self, AppError> {
        std::fs::create_dir_all(root.join("episodes")).map_err(AppError::Io)?;
        let store = Self { root };
        if !store.index_path().exists() {
            store.save_index(&EpisodeIndex::empty())?;
        }
        Ok(store)
    }

    fn episodes_dir(&self) -> PathBuf {
        self.root.join("episodes")
    }

    fn episode_path(&self, id: &str) -> PathBuf {
        self.episodes_dir().join(format!("episode-{id}.json"))
    }

    fn jsonl_path(&self) -> PathBuf {
        self.root.join("episodes.jsonl")
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    /// Acquire the exclusive advisory lock guarding this store's index and
    /// JSONL trail against a concurrent process.
    fn lock(&self, reason: &str) -> Result<SessionLock, AppError> {
        csa_lock::acquire_lock_blocking(&self.root, "episode-store", reason, LOCK_TIMEOUT)
            .map_err(|err| AppError::LockError(err.to_string()))
    }

    fn load_index(&self) -> EpisodeIndex {
        match std::fs::read(self.index_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(error = %err, "index.json is corrupted, resetting");
                EpisodeIndex::empty()
            }),
            Err(_) => EpisodeIndex::empty(),
        }
    }

    fn save_index(&self, index: &EpisodeIndex) -> Result<(), AppError> {
        write_atomic(&self.index_path(), &serde_json::to_vec_pretty(index)?)
    }

    fn write_episode_file(&self, episode: &Episode) -> Result<(), AppError> {
        write_atomic(
            &self.episode_path(&episode.episode_id),
            &serde_json::to_vec_pretty(episode)?,
        )
    }

    fn append_jsonl(&self, value: &Value) -> Result<(), AppError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.jsonl_path())
            .map_err(AppError::Io)?;
        file.write_all(&line).map_err(AppError::Io)
    }

    /// Create a new episode, persist it, and insert it into the index.
    pub fn store_episode(
        &self,
        prompt: String,
        enriched_prompt: Option<String>,
        clarifications: HashMap<String, String>,
        context: serde_json::Map<String, Value>,
        tags: Vec<String>,
    ) -> Result<String, AppError> {
        let id = csa_core::episode_id();
        let episode = Episode::new(id.clone(), prompt, enriched_prompt, clarifications, context, tags);

        let _lock = self.lock("store_episode")?;
        self.write_episode_file(&episode)?;
        self.append_jsonl(&serde_json::to_value(&episode)?)?;

        let mut index = self.load_index();
        index.upsert(IndexEntry::from_episode(&episode));
        self.save_index(&index)?;

        Ok(id)
    }

    /// Persist an already-built episode as-is, keeping its `episode_id`
    /// unless that id is already occupied by another stored episode, in
    /// which case a fresh one is assigned. Used by the `import` CLI path,
    /// distinct from [`EpisodeStore::store_episode`] which always mints a
    /// new id.
    pub fn import_episode(&self, mut episode: Episode) -> Result<String, AppError> {
        let _lock = self.lock("import_episode")?;
        if self.get_episode(&episode.episode_id).is_some() {
            episode.episode_id = csa_core::episode_id();
        }
        let id = episode.episode_id.clone();

        self.write_episode_file(&episode)?;
        self.append_jsonl(&serde_json::to_value(&episode)?)?;

        let mut index = self.load_index();
        index.upsert(IndexEntry::from_episode(&episode));
        self.save_index(&index)?;

        Ok(id)
    }

    /// Look up an episode by canonical file first, falling back to a
    /// linear scan of the JSONL trail.
    pub fn get_episode(&self, id: &str) -> Option<Episode> {
        if let Ok(bytes) = std::fs::read(self.episode_path(id)) {
            match serde_json::from_slice(&bytes) {
                Ok(episode) => return Some(episode),
                Err(err) => warn!(episode_id = %id, error = %err, "corrupted episode file"),
            }
        }

        let file = std::fs::File::open(self.jsonl_path()).ok()?;
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { continue };
            let Ok(episode) = serde_json::from_str::<Episode>(&line) else {
                continue;
            };
            if episode.episode_id == id {
                return Some(episode);
            }
        }
        None
    }

    /// Update an episode's outcome, success, and optionally duration and
    /// executed commands. `outcome` is validated against the enum before
    /// anything is written.
    pub fn update_outcome(
        &self,
        id: &str,
        outcome: &str,
        success: Option<bool>,
        duration_seconds: Option<f64>,
        commands_executed: Option<Vec<String>>,
    ) -> Result<(), AppError> {
        let outcome = parse_outcome(outcome)
            .ok_or_else(|| AppError::ValidationError(format!("unknown outcome: {outcome}")))?;

        let _lock = self.lock("update_outcome")?;
        let mut episode = self
            .get_episode(id)
            .ok_or_else(|| AppError::StoreCorruption {
                path: self.episode_path(id).display().to_string(),
                reason: "episode not found".to_string(),
            })?;

        episode.outcome = outcome;
        episode.success = success;
        if let Some(duration) = duration_seconds {
            episode.duration_seconds = Some(duration);
        }
        if let Some(commands) = commands_executed {
            episode.commands_executed = commands;
        }
        episode.updated_at = Utc::now();

        self.write_episode_file(&episode)?;
        self.append_jsonl(&serde_json::json!({
            "episode_id": id,
            "event": "outcome_updated",
            "outcome": episode.outcome,
            "success": episode.success,
            "timestamp": episode.updated_at,
        }))?;

        let mut index = self.load_index();
        index.upsert(IndexEntry::from_episode(&episode));
        self.save_index(&index)?;

        Ok(())
    }

    /// Record a relationship on the source episode. Idempotent for the
    /// same `(source, target, kind)` triple; rejects an unknown kind or
    /// either endpoint not existing.
    pub fn add_relationship(&self, source_id: &str, target_id: &str, kind: &str) -> Result<(), AppError> {
        let kind = parse_relationship_kind(kind)
            .ok_or_else(|| AppError::ValidationError(format!("unknown relationship kind: {kind}")))?;

        let _lock = self.lock("add_relationship")?;
        let mut source = self
            .get_episode(source_id)
            .ok_or_else(|| AppError::ValidationError(format!("unknown source episode: {source_id}")))?;
        if self.get_episode(target_id).is_none() {
            return Err(AppError::ValidationError(format!(
                "unknown target episode: {target_id}"
            )));
        }

        let already_present = source.relationships.iter().any(|r| {
            r.source_id == source_id && r.target_id == target_id && r.kind == kind
        });
        if already_present {
            return Ok(());
        }

        source.relationships.push(Relationship {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind,
        });
        source.updated_at = Utc::now();
        self.write_episode_file(&source)
    }

    /// Rank episodes against `query` using the weighted scoring formula
    /// (tag substring, keyword overlap, title overlap, type match, time
    /// decay, stored relevance).
    pub fn search_episodes(&self, query: &str, max_results: usize, min_score: f64) -> Vec<(Episode, f64)> {
        let index = self.load_index();
        if index.episodes.is_empty() {
            return Vec::new();
        }

        let query_lower = query.to_lowercase();
        let query_words: std::collections::HashSet<&str> = query_lower.split_whitespace().collect();
        let now = Utc::now();

        let mut scored = Vec::new();
        for entry in &index.episodes {
            let mut score = 0.0;

            for tag in &entry.tags {
                if query_lower.contains(&tag.to_lowercase()) {
                    score += 0.4;
                }
            }

            let episode_keywords: std::collections::HashSet<&str> =
                entry.keywords.iter().map(String::as_str).collect();
            let common_keywords = query_words.intersection(&episode_keywords).count();
            if common_keywords > 0 {
                score += 0.3 * (common_keywords as f64 / episode_keywords.len().max(1) as f64);
            }

            let title_lower = entry.title.to_lowercase();
            let title_words: std::collections::HashSet<&str> = title_lower.split_whitespace().collect();
            let common_title = query_words.intersection(&title_words).count();
            if common_title > 0 {
                score += 0.2 * (common_title as f64 / title_words.len().max(1) as f64);
            }

            if query_lower.contains(entry.episode_type.as_str()) {
                score += 0.1;
            }

            let age_days = (now - entry.timestamp).num_days();
            let time_factor = if age_days < 7 {
                1.0
            } else if age_days < 30 {
                0.9
            } else if age_days < 90 {
                0.7
            } else if age_days < 180 {
                0.5
            } else {
                0.3
            };

            let final_score = score * time_factor * entry.relevance_score;
            if final_score >= min_score {
                if let Some(episode) = self.get_episode(&entry.id) {
                    scored.push((episode, final_score));
                }
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);
        scored
    }

    /// List index entries, most recent first, optionally filtered by
    /// episode type and/or tag. Reads only the secondary index, never the
    /// canonical per-episode files.
    pub fn list(&self, episode_type: Option<&str>, tag: Option<&str>) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self
            .load_index()
            .episodes
            .into_iter()
            .filter(|e| episode_type.map(|t| e.episode_type == t).unwrap_or(true))
            .filter(|e| tag.map(|t| e.tags.iter().any(|et| et == t)).unwrap_or(true))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// Remove episodes older than `days` from the index and `episodes/`,
    /// leaving the JSONL trail untouched. Returns the number removed.
    pub fn cleanup_old(&self, days: i64) -> Result<usize, AppError> {
        let _lock = self.lock("cleanup_old")?;
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut index = self.load_index();

        let (to_keep, to_remove): (Vec<_>, Vec<_>) =
            index.episodes.drain(..).partition(|entry| entry.timestamp > cutoff);
        index.episodes = to_keep;

        for entry in &to_remove {
            let path = self.episode_path(&entry.id);
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }

        if !to_remove.is_empty() {
            index
                .metadata
                .insert("last_cleanup".to_string(), Value::String(Utc::now().to_rfc3339()));
            self.save_index(&index)?;
        }

        Ok(to_remove.len())
    }

    /// Remove an episode's canonical file and index entry. Idempotent;
    /// the JSONL trail is preserved for audit.
    pub fn delete_episode(&self, id: &str) -> Result<bool, AppError> {
        let _lock = self.lock("delete_episode")?;
        let mut deleted = false;
        let path = self.episode_path(id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(AppError::Io)?;
            deleted = true;
        }

        let mut index = self.load_index();
        if index.remove(id) {
            self.save_index(&index)?;
            deleted = true;
        }

        Ok(deleted)
    }
}

fn parse_outcome(raw: &str) -> Option<Outcome> {
    match raw {
        "success" => Some(Outcome::Success),
        "partial" => Some(Outcome::Partial),
        "failed" => Some(Outcome::Failed),
        "abandoned" => Some(Outcome::Abandoned),
        "unknown" => Some(Outcome::Unknown),
        _ => None,
    }
}

fn parse_relationship_kind(raw: &str) -> Option<RelationshipKind> {
    match raw {
        "SOLVES" => Some(RelationshipKind::Solves),
        "CAUSES" => Some(RelationshipKind::Causes),
        "DEPENDS_ON" => Some(RelationshipKind::DependsOn),
        "RELATED_TO" => Some(RelationshipKind::RelatedTo),
        "SUPERSEDES" => Some(RelationshipKind::Supersedes),
        _ => None,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(AppError::Io)?;
    tmp.write_all(bytes).map_err(AppError::Io)?;
    tmp.persist(path)
        .map_err(|err| AppError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, EpisodeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EpisodeStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn store_and_get_roundtrips() {
        let (_dir, store) = store();
        let id = store
            .store_episode(
                "deploy graphql-server to production".to_string(),
                None,
                HashMap::new(),
                serde_json::Map::new(),
                vec!["deployment".to_string(), "production".to_string()],
            )
            .unwrap();

        let episode = store.get_episode(&id).unwrap();
        assert_eq!(episode.episode_id, id);
        assert_eq!(episode.original_prompt, "deploy graphql-server to production");
    }

    #[test]
    fn get_falls_back_to_jsonl_when_canonical_file_missing() {
        let (_dir, store) = store();
        let id = store
            .store_episode(
                "check cluster status".to_string(),
                None,
                HashMap::new(),
                serde_json::Map::new(),
                vec![],
            )
            .unwrap();

        std::fs::remove_file(store.episode_path(&id)).unwrap();
        let episode = store.get_episode(&id).unwrap();
        assert_eq!(episode.episode_id, id);
    }

    #[test]
    fn update_outcome_rejects_unknown_outcome() {
        let (_dir, store) = store();
        let id = store
            .store_episode("fix pipeline".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();
        let err = store.update_outcome(&id, "bogus", Some(true), None, None);
        assert!(err.is_err());
    }

    #[test]
    fn update_outcome_persists_success_and_duration() {
        let (_dir, store) = store();
        let id = store
            .store_episode("fix pipeline".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();
        store.update_outcome(&id, "success", Some(true), Some(42.0), None).unwrap();

        let episode = store.get_episode(&id).unwrap();
        assert_eq!(episode.outcome, Outcome::Success);
        assert_eq!(episode.success, Some(true));
        assert_eq!(episode.duration_seconds, Some(42.0));
    }

    #[test]
    fn add_relationship_is_idempotent() {
        let (_dir, store) = store();
        let a = store
            .store_episode("a".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();
        let b = store
            .store_episode("b".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();

        store.add_relationship(&a, &b, "SOLVES").unwrap();
        store.add_relationship(&a, &b, "SOLVES").unwrap();

        let episode = store.get_episode(&a).unwrap();
        assert_eq!(episode.relationships.len(), 1);
    }

    #[test]
    fn add_relationship_rejects_unknown_kind() {
        let (_dir, store) = store();
        let a = store
            .store_episode("a".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();
        let err = store.add_relationship(&a, &a, "BOGUS");
        assert!(err.is_err());
    }

    #[test]
    fn add_relationship_rejects_unknown_endpoint() {
        let (_dir, store) = store();
        let a = store
            .store_episode("a".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();
        let err = store.add_relationship(&a, "ep_missing", "SOLVES");
        assert!(err.is_err());
    }

    #[test]
    fn search_finds_matching_tagged_episode() {
        let (_dir, store) = store();
        store
            .store_episode(
                "deploy graphql-server to production".to_string(),
                None,
                HashMap::new(),
                serde_json::Map::new(),
                vec!["deployment".to_string(), "production".to_string()],
            )
            .unwrap();

        let results = store.search_episodes("deploy graphql-server to production", 5, 0.1);
        assert_eq!(results.len(), 1);
        assert!(results[0].1 >= 0.1);
    }

    #[test]
    fn search_respects_min_score_threshold() {
        let (_dir, store) = store();
        store
            .store_episode("unrelated topic entirely".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();

        let results = store.search_episodes("completely different query", 5, 0.5);
        assert!(results.is_empty());
    }

    #[test]
    fn delete_episode_is_idempotent_and_preserves_jsonl() {
        let (_dir, store) = store();
        let id = store
            .store_episode("temporary episode".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();

        assert!(store.delete_episode(&id).unwrap());
        assert!(!store.delete_episode(&id).unwrap());
        assert!(store.get_episode(&id).is_none());

        let jsonl = std::fs::read_to_string(store.jsonl_path()).unwrap();
        assert!(jsonl.contains(&id));
    }

    #[test]
    fn cleanup_old_removes_stale_index_entries_but_keeps_jsonl() {
        let (_dir, store) = store();
        let id = store
            .store_episode("old episode".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();

        // Force the index entry to look ancient.
        let mut index = store.load_index();
        index.episodes[0].timestamp = Utc::now() - chrono::Duration::days(400);
        store.save_index(&index).unwrap();

        let removed = store.cleanup_old(180).unwrap();
        assert_eq!(removed, 1);
        assert!(store.load_index().find(&id).is_none());

        let jsonl = std::fs::read_to_string(store.jsonl_path()).unwrap();
        assert!(jsonl.contains(&id));
    }

    #[test]
    fn import_episode_keeps_id_when_unused() {
        let (_dir, store) = store();
        let episode = Episode::new(
            "ep_fixed_id".to_string(),
            "restore from backup".to_string(),
            None,
            HashMap::new(),
            serde_json::Map::new(),
            vec![],
        );
        let id = store.import_episode(episode).unwrap();
        assert_eq!(id, "ep_fixed_id");
    }

    #[test]
    fn import_episode_reassigns_id_on_collision() {
        let (_dir, store) = store();
        let existing = store
            .store_episode("original".to_string(), None, HashMap::new(), serde_json::Map::new(), vec![])
            .unwrap();

        let colliding = Episode::new(
            existing.clone(),
            "imported duplicate".to_string(),
            None,
            HashMap::new(),
            serde_json::Map::new(),
            vec![],
        );
        let id = store.import_episode(colliding).unwrap();
        assert_ne!(id, existing);
        assert_eq!(store.get_episode(&existing).unwrap().original_prompt, "original");
    }

    #[test]
    fn list_filters_by_type_and_tag() {
        let (_dir, store) = store();
        store
            .store_episode(
                "deploy graphql-server".to_string(),
                None,
                HashMap::new(),
                serde_json::Map::new(),
                vec!["prod".to_string()],
            )
            .unwrap();
        store
            .store_episode(
                "check cluster status".to_string(),
                None,
                HashMap::new(),
                serde_json::Map::new(),
                vec!["staging".to_string()],
            )
            .unwrap();

        assert_eq!(store.list(None, None).len(), 2);
        assert_eq!(store.list(Some("deployment"), None).len(), 1);
        assert_eq!(store.list(None, Some("staging")).len(), 1);
        assert_eq!(store.list(Some("deployment"), Some("staging")).len(), 0);
    }

    #[test]
    fn corrupted_index_resets_to_empty_skeleton() {
        let (_dir, store) = store();
        std::fs::write(store.index_path(), b"not json").unwrap();
        let index = store.load_index();
        assert!(index.episodes.is_empty());
    }

    #[test]
    fn store_episode_blocks_until_a_held_lock_is_released() {
        let (dir, store) = store();
        let held = csa_lock::acquire_lock(dir.path(), "episode-store", "held by another process").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let root = dir.path().to_path_buf();
        let handle = std::thread::spawn(move || {
            let store = EpisodeStore::new(root).unwrap();
            let result = store.store_episode(
                "queued while locked".to_string(),
                None,
                HashMap::new(),
                serde_json::Map::new(),
                vec![],
            );
            tx.send(()).ok();
            result
        });

        std::thread::sleep(std::time::Duration::from_millis(150));
        drop(held);

        rx.recv_timeout(std::time::Duration::from_secs(5)).expect("writer did not finish");
        assert!(handle.join().unwrap().is_ok());
    }
}
