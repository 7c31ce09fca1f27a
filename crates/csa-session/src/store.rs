//! On-disk Session Store (spec §4.7): `session/<agent_id>/state.json`,
//! one canonical file per session, written atomically.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use csa_core::AppError;
use csa_lock::SessionLock;
use serde_json::Value;

use crate::model::{Session, SessionPhase};

/// Cross-process exclusive lock timeout for a session read-modify-write
/// (spec §5: shared stores require an exclusive advisory lock).
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalOutcome {
    Completed,
    Failed,
    Abandoned,
}

impl FinalOutcome {
    fn phase(self) -> SessionPhase {
        match self {
            Self::Completed => SessionPhase::Completed,
            Self::Failed => SessionPhase::Failed,
            Self::Abandoned => SessionPhase::Abandoned,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilters {
    pub phase: Option<SessionPhase>,
    pub agent_name: Option<String>,
    pub resume_ready_only: bool,
}

pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// `root` is the `session/` directory.
    pub fn new(root: PathBuf) -> Result<Self, AppError> {
        std::fs::create_dir_all(&root).map_err(AppError::Io)?;
        Ok(Self { root })
    }

    fn session_dir(&self, agent_id: &str) -> PathBuf {
        self.root.join(agent_id)
    }

    fn state_path(&self, agent_id: &str) -> PathBuf {
        self.session_dir(agent_id).join("state.json")
    }

    /// Exclusive lock guarding a single session's `state.json`, keyed by
    /// `agent_id` so unrelated sessions never contend with each other.
    fn lock_session(&self, agent_id: &str, reason: &str) -> Result<SessionLock, AppError> {
        csa_lock::acquire_lock_blocking(&self.root, agent_id, reason, LOCK_TIMEOUT)
            .map_err(|err| AppError::LockError(err.to_string()))
    }

    /// Exclusive lock guarding a directory-wide scan (e.g. cleanup) that
    /// touches more than one session at once.
    fn lock_store(&self, reason: &str) -> Result<SessionLock, AppError> {
        csa_lock::acquire_lock_blocking(&self.root, "session-store", reason, LOCK_TIMEOUT)
            .map_err(|err| AppError::LockError(err.to_string()))
    }

    fn write(&self, session: &Session) -> Result<(), AppError> {
        let dir = self.session_dir(&session.agent_id);
        std::fs::create_dir_all(&dir).map_err(AppError::Io)?;
        write_atomic(&self.state_path(&session.agent_id), &serde_json::to_vec_pretty(session)?)
    }

    pub fn create_session(
        &self,
        agent_name: impl Into<String>,
        purpose: impl Into<String>,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<String, AppError> {
        let session = Session::new(agent_name.into(), purpose.into(), metadata.unwrap_or_default());
        let id = session.agent_id.clone();
        let _lock = self.lock_session(&id, "create_session")?;
        self.write(&session)?;
        Ok(id)
    }

    pub fn get_session(&self, agent_id: &str) -> Option<Session> {
        match std::fs::read(self.state_path(agent_id)) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(session) => Some(session),
                Err(err) => {
                    tracing::warn!(agent_id, error = %err, "corrupted session state file");
                    None
                }
            },
            Err(_) => None,
        }
    }

    /// Append a phase transition and/or merge metadata and/or record an
    /// error, then persist. Returns `false` if the session doesn't exist.
    pub fn update_state(
        &self,
        agent_id: &str,
        phase: Option<SessionPhase>,
        metadata: Option<HashMap<String, Value>>,
        error: Option<String>,
    ) -> Result<bool, AppError> {
        let _lock = self.lock_session(agent_id, "update_state")?;
        let Some(mut session) = self.get_session(agent_id) else {
            return Ok(false);
        };
        if let Some(phase) = phase {
            session.record_transition(phase);
        }
        if let Some(metadata) = metadata {
            session.metadata.extend(metadata);
        }
        if let Some(error) = error {
            session.record_error(error);
        }
        session.last_updated = Utc::now();
        self.write(&session)?;
        Ok(true)
    }

    pub fn should_resume(&self, agent_id: &str) -> bool {
        self.get_session(agent_id)
            .map(|s| s.resume_ready(Utc::now()))
            .unwrap_or(false)
    }

    pub fn list_sessions(&self, filters: &SessionFilters) -> Vec<Session> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut sessions: Vec<Session> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter_map(|agent_id| self.get_session(&agent_id))
            .filter(|s| filters.phase.map(|p| p == s.phase).unwrap_or(true))
            .filter(|s| {
                filters
                    .agent_name
                    .as_ref()
                    .map(|name| &s.agent_name == name)
                    .unwrap_or(true)
            })
            .filter(|s| !filters.resume_ready_only || s.resume_ready(Utc::now()))
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    /// Finalize a session: transitions it to a terminal phase
    /// (permanently disabling resume) and optionally records a summary.
    pub fn finalize_session(
        &self,
        agent_id: &str,
        outcome: FinalOutcome,
        summary: Option<String>,
    ) -> Result<(), AppError> {
        let _lock = self.lock_session(agent_id, "finalize_session")?;
        let mut session = self
            .get_session(agent_id)
            .ok_or_else(|| AppError::SessionNotFound(agent_id.to_string()))?;
        session.record_transition(outcome.phase());
        if let Some(summary) = summary {
            session
                .metadata
                .insert("final_summary".to_string(), Value::String(summary));
        }
        self.write(&session)
    }

    /// Remove every session whose `last_updated` is older than `hours`.
    /// Returns the count removed.
    pub fn cleanup_old_sessions(&self, hours: i64) -> Result<usize, AppError> {
        let _lock = self.lock_store("cleanup_old_sessions")?;
        let cutoff = Utc::now() - chrono::Duration::hours(hours);
        let mut removed = 0;
        for session in self.list_sessions(&SessionFilters::default()) {
            if session.last_updated < cutoff {
                let dir = self.session_dir(&session.agent_id);
                if dir.exists() {
                    std::fs::remove_dir_all(&dir).map_err(AppError::Io)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(AppError::Io)?;
    tmp.write_all(bytes).map_err(AppError::Io)?;
    tmp.persist(path).map_err(|err| AppError::Io(err.error))?;
    Ok(())
}
