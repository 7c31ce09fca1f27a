//! On-disk Pending-Update Store (spec §4.8): an append-only JSONL audit
//! trail, a mutable index of live records, and an archive of applied
//! updates.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use csa_core::AppError;
use csa_lock::SessionLock;
use serde_json::Value;

use crate::content_hash;
use crate::merge::merge_into;
use crate::model::{Category, Discovery, PendingUpdate, Status};

const MIN_CONFIDENCE: f64 = 0.7;

/// Cross-process exclusive lock timeout for an index read-modify-write
/// (spec §5: shared stores require an exclusive advisory lock).
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PendingUpdateStore {
    root: PathBuf,
}

impl PendingUpdateStore {
    /// `root` is the `pending-updates/` directory.
    pub fn new(root: PathBuf) -> Result<Self, AppError> {
        std::fs::create_dir_all(root.join("applied")).map_err(AppError::Io)?;
        let store = Self { root };
        if !store.index_path().exists() {
            store.save_index(&HashMap::new())?;
        }
        Ok(store)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("pending-index.json")
    }

    fn jsonl_path(&self) -> PathBuf {
        self.root.join("pending-updates.jsonl")
    }

    /// Acquire the exclusive advisory lock guarding this store's index and
    /// JSONL trail against a concurrent process.
    fn lock(&self, reason: &str) -> Result<SessionLock, AppError> {
        csa_lock::acquire_lock_blocking(&self.root, "pending-update-store", reason, LOCK_TIMEOUT)
            .map_err(|err| AppError::LockError(err.to_string()))
    }

    fn archive_path(&self, id: &str) -> PathBuf {
        self.root.join("applied").join(format!("update-{id}.json"))
    }

    fn load_index(&self) -> HashMap<String, PendingUpdate> {
        match std::fs::read(self.index_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "pending-index.json is corrupted, resetting");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    fn save_index(&self, index: &HashMap<String, PendingUpdate>) -> Result<(), AppError> {
        write_atomic(&self.index_path(), &serde_json::to_vec_pretty(index)?)
    }

    fn append_event(&self, event: &str, id: &str, extra: Value) -> Result<(), AppError> {
        let mut record = serde_json::Map::new();
        record.insert("event".to_string(), Value::String(event.to_string()));
        record.insert("update_id".to_string(), Value::String(id.to_string()));
        record.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
        if let Value::Object(extra_map) = extra {
            for (k, v) in extra_map {
                record.insert(k, v);
            }
        }
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.jsonl_path())
            .map_err(AppError::Io)?;
        file.write_all(&line).map_err(AppError::Io)
    }

    /// Validate, deduplicate by content hash, and insert (or bump) a
    /// pending update. Returns the update id.
    pub fn create(&self, discovery: Discovery) -> Result<String, AppError> {
        if discovery.confidence < MIN_CONFIDENCE {
            return Err(AppError::ValidationError(format!(
                "confidence {} below minimum {MIN_CONFIDENCE}",
                discovery.confidence
            )));
        }
        if !discovery.category.allows_section(&discovery.target_section) {
            return Err(AppError::ValidationError(format!(
                "category '{}' may not target section '{}'",
                discovery.category.as_str(),
                discovery.target_section
            )));
        }

        let hash = content_hash::compute(&discovery.target_section, &discovery.proposed_change);
        let _lock = self.lock("create")?;
        let mut index = self.load_index();

        if let Some(existing) = index.values_mut().find(|u| u.content_hash == hash) {
            existing.seen_count += 1;
            if !existing.seen_by_agents.contains(&discovery.agent_id) {
                existing.seen_by_agents.push(discovery.agent_id.clone());
            }
            existing.updated_at = Utc::now();
            let id = existing.update_id.clone();
            self.save_index(&index)?;
            self.append_event(
                "duplicate_seen",
                &id,
                serde_json::json!({"agent_id": discovery.agent_id}),
            )?;
            return Ok(id);
        }

        let id = csa_core::update_id();
        let now = Utc::now();
        let update = PendingUpdate {
            update_id: id.clone(),
            content_hash: hash,
            category: discovery.category,
            target_section: discovery.target_section,
            proposed_change: discovery.proposed_change,
            summary: discovery.summary,
            confidence: discovery.confidence,
            status: Status::Pending,
            seen_count: 1,
            seen_by_agents: vec![discovery.agent_id],
            created_at: now,
            updated_at: now,
        };
        index.insert(id.clone(), update.clone());
        self.save_index(&index)?;
        self.append_event("created", &id, serde_json::to_value(&update)?)?;
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<PendingUpdate> {
        self.load_index().remove(id)
    }

    pub fn list(&self, status: Option<Status>) -> Vec<PendingUpdate> {
        let mut updates: Vec<PendingUpdate> = self
            .load_index()
            .into_values()
            .filter(|u| status.map(|s| s == u.status).unwrap_or(true))
            .collect();
        updates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        updates
    }

    fn transition(&self, id: &str, next: Status) -> Result<(), AppError> {
        let _lock = self.lock("transition")?;
        let mut index = self.load_index();
        let update = index
            .get_mut(id)
            .ok_or_else(|| AppError::UpdateNotFound(id.to_string()))?;
        if !update.status.can_transition_to(next) {
            return Err(AppError::UpdateAlreadyResolved {
                id: id.to_string(),
                status: update.status.as_str().to_string(),
            });
        }
        update.status = next;
        update.updated_at = Utc::now();
        self.save_index(&index)?;
        self.append_event(next.as_str(), id, Value::Null)
    }

    pub fn approve(&self, id: &str) -> Result<(), AppError> {
        self.transition(id, Status::Approved)
    }

    pub fn reject(&self, id: &str) -> Result<(), AppError> {
        self.transition(id, Status::Rejected)
    }

    /// Apply an approved update to the context document at `context_path`:
    /// back it up, merge `proposed_change` under
    /// `sections.<target_section>`, write atomically, archive the update,
    /// and mark it applied.
    pub fn apply(&self, id: &str, context_path: &Path) -> Result<(), AppError> {
        let _lock = self.lock("apply")?;
        let mut index = self.load_index();
        let update = index
            .get(id)
            .ok_or_else(|| AppError::UpdateNotFound(id.to_string()))?
            .clone();
        if update.status != Status::Approved {
            return Err(AppError::UpdateAlreadyResolved {
                id: id.to_string(),
                status: update.status.as_str().to_string(),
            });
        }

        let mut doc: Value = match std::fs::read(context_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or(Value::Object(Default::default())),
            Err(_) => Value::Object(Default::default()),
        };

        let backup_path = context_path.with_extension(format!(
            "backup-{}.json",
            Utc::now().format("%Y%m%d%H%M%S")
        ));
        write_atomic(&backup_path, &serde_json::to_vec_pretty(&doc)?)?;

        if !doc.is_object() {
            doc = Value::Object(Default::default());
        }
        let sections = doc
            .as_object_mut()
            .unwrap()
            .entry("sections")
            .or_insert_with(|| Value::Object(Default::default()));
        if !sections.is_object() {
            *sections = Value::Object(Default::default());
        }
        let section_entry = sections
            .as_object_mut()
            .unwrap()
            .entry(update.target_section.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        merge_into(section_entry, &update.proposed_change);

        let metadata = doc
            .as_object_mut()
            .unwrap()
            .entry("metadata")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(metadata_map) = metadata.as_object_mut() {
            metadata_map.insert(
                "last_updated".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        write_atomic(context_path, &serde_json::to_vec_pretty(&doc)?)?;
        write_atomic(&self.archive_path(id), &serde_json::to_vec_pretty(&update)?)?;

        if let Some(entry) = index.get_mut(id) {
            entry.status = Status::Applied;
            entry.updated_at = Utc::now();
        }
        self.save_index(&index)?;
        self.append_event("applied", id, Value::Null)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(AppError::Io)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(AppError::Io)?;
    tmp.write_all(bytes).map_err(AppError::Io)?;
    tmp.persist(path).map_err(|err| AppError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, PendingUpdateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingUpdateStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn discovery(agent: &str) -> Discovery {
        Discovery {
            category: Category::NewResource,
            target_section: "application_services".to_string(),
            proposed_change: json!({"name": "tcm-api", "status": "running"}),
            summary: "discovered tcm-api running".to_string(),
            confidence: 0.9,
            agent_id: agent.to_string(),
        }
    }

    #[test]
    fn rejects_low_confidence_discovery() {
        let (_d, store) = store();
        let mut disc = discovery("agent-a");
        disc.confidence = 0.5;
        assert!(store.create(disc).is_err());
    }

    #[test]
    fn rejects_section_not_allowed_for_category() {
        let (_d, store) = store();
        let mut disc = discovery("agent-a");
        disc.target_section = "not_a_real_section".to_string();
        assert!(store.create(disc).is_err());
    }

    #[test]
    fn s6_duplicate_discovery_dedups_and_bumps_seen_count() {
        let (_d, store) = store();
        let id1 = store.create(discovery("agent-a")).unwrap();
        let id2 = store.create(discovery("agent-b")).unwrap();
        assert_eq!(id1, id2);
        let update = store.get(&id1).unwrap();
        assert_eq!(update.seen_count, 2);
        assert_eq!(update.seen_by_agents, vec!["agent-a", "agent-b"]);
    }

    #[test]
    fn status_transitions_follow_allowed_graph() {
        let (_d, store) = store();
        let id = store.create(discovery("agent-a")).unwrap();
        assert!(store.approve(&id).is_ok());
        assert!(store.reject(&id).is_err());
        assert_eq!(store.get(&id).unwrap().status, Status::Approved);
    }

    #[test]
    fn reject_is_terminal_for_rejection_path() {
        let (_d, store) = store();
        let id = store.create(discovery("agent-a")).unwrap();
        store.reject(&id).unwrap();
        assert!(store.approve(&id).is_err());
    }

    #[test]
    fn s6_apply_merges_change_into_context_document() {
        let (dir, store) = store();
        let context_path = dir.path().join("project-context.json");
        std::fs::write(&context_path, serde_json::to_vec(&json!({"sections": {}})).unwrap())
            .unwrap();

        let id = store.create(discovery("agent-a")).unwrap();
        store.approve(&id).unwrap();
        store.apply(&id, &context_path).unwrap();

        let doc: Value = serde_json::from_slice(&std::fs::read(&context_path).unwrap()).unwrap();
        assert_eq!(doc["sections"]["application_services"]["name"], "tcm-api");
        assert_eq!(store.get(&id).unwrap().status, Status::Applied);
        assert!(store.archive_path(&id).exists());
    }

    #[test]
    fn apply_requires_approved_status() {
        let (dir, store) = store();
        let context_path = dir.path().join("project-context.json");
        std::fs::write(&context_path, b"{}").unwrap();
        let id = store.create(discovery("agent-a")).unwrap();
        assert!(store.apply(&id, &context_path).is_err());
    }

    #[test]
    fn list_filters_by_status() {
        let (_d, store) = store();
        let id1 = store.create(discovery("agent-a")).unwrap();
        let mut disc2 = discovery("agent-b");
        disc2.target_section = "cluster_details".to_string();
        disc2.proposed_change = json!({"name": "other"});
        let id2 = store.create(disc2).unwrap();
        store.approve(&id1).unwrap();

        assert_eq!(store.list(Some(Status::Approved)).len(), 1);
        assert_eq!(store.list(Some(Status::Pending)).len(), 1);
        assert_eq!(store.list(None).len(), 2);
        let _ = id2;
    }
}
