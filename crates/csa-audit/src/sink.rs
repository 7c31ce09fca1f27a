//! Append-only daily/session audit journals and the monthly metrics
//! journal. Every write is a single O_APPEND write of one JSON line.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use csa_core::AppError;
use csa_lock::SessionLock;
use serde_json::Value;

use crate::record::AuditRecord;

/// Cross-process exclusive lock timeout for a journal append (spec §5:
/// shared stores require an exclusive advisory lock).
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AuditSink {
    logs_dir: PathBuf,
    metrics_dir: PathBuf,
}

impl AuditSink {
    pub fn new(logs_dir: PathBuf, metrics_dir: PathBuf) -> Self {
        Self { logs_dir, metrics_dir }
    }

    fn daily_journal_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y-%m-%d");
        self.logs_dir.join(format!("audit-{stamp}.jsonl"))
    }

    fn session_journal_path(&self, session_id: &str) -> PathBuf {
        self.logs_dir.join(format!("session-{session_id}.jsonl"))
    }

    fn monthly_metrics_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y-%m");
        self.metrics_dir.join(format!("metrics-{stamp}.jsonl"))
    }

    /// Acquire the exclusive advisory lock guarding this sink's journals
    /// against a concurrent process.
    fn lock(&self, reason: &str) -> Result<SessionLock, AppError> {
        csa_lock::acquire_lock_blocking(&self.logs_dir, "audit-sink", reason, LOCK_TIMEOUT)
            .map_err(|err| AppError::LockError(err.to_string()))
    }

    fn append_line(path: &Path, value: &Value) -> Result<(), AppError> {
        let mut line = serde_json::to_vec(value).map_err(AppError::Serde)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(AppError::Io)?;
        file.write_all(&line).map_err(AppError::Io)
    }

    /// Append one audit record to both the daily journal and that
    /// session's own journal. Errors here MUST NOT propagate out of the
    /// hook path per spec §7 — callers typically log-and-continue on
    /// failure rather than bubbling it up.
    pub fn record(&self, record: &AuditRecord) -> Result<(), AppError> {
        let value = serde_json::to_value(record).map_err(AppError::Serde)?;
        let _lock = self.lock("record")?;
        Self::append_line(&self.daily_journal_path(), &value)?;
        Self::append_line(&self.session_journal_path(&record.session_id), &value)?;
        Self::append_line(&self.monthly_metrics_path(), &value)?;
        Ok(())
    }

    /// Best-effort variant used from hook paths: log and swallow.
    pub fn record_best_effort(&self, record: &AuditRecord) {
        if let Err(err) = self.record(record) {
            tracing::warn!(error = %err, "failed to append audit record");
        }
    }

    /// Read every metrics record in the trailing `days` monthly files
    /// (best-effort: current and previous month, since a record's
    /// timestamp determines which trailing window it falls in).
    pub fn read_metrics_records(&self, days: i64) -> Vec<AuditRecord> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut records = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.metrics_dir) else {
            return records;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Ok(contents) = std::fs::read_to_string(&path) else {
                continue;
            };
            for line in contents.lines() {
                if let Ok(record) = serde_json::from_str::<AuditRecord>(line) {
                    if record.timestamp >= cutoff {
                        records.push(record);
                    }
                }
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csa_core::SecurityTier;
    use serde_json::json;

    fn sink() -> (tempfile::TempDir, AuditSink) {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let metrics = dir.path().join("metrics");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::create_dir_all(&metrics).unwrap();
        let sink = AuditSink::new(logs, metrics);
        (dir, sink)
    }

    #[test]
    fn record_appends_to_daily_and_session_journals() {
        let (_dir, sink) = sink();
        let record = AuditRecord::new(
            "session-1",
            "bash",
            "git status",
            &json!({}),
            10,
            0,
            SecurityTier::T0,
            "clean",
        );
        sink.record(&record).unwrap();
        assert!(sink.daily_journal_path().exists());
        assert!(sink.session_journal_path("session-1").exists());
        assert!(sink.monthly_metrics_path().exists());
    }

    #[test]
    fn multiple_records_append_without_clobbering() {
        let (_dir, sink) = sink();
        for i in 0..5 {
            let record = AuditRecord::new(
                "session-1",
                "bash",
                format!("echo {i}"),
                &json!({}),
                1,
                0,
                SecurityTier::T0,
                "out",
            );
            sink.record(&record).unwrap();
        }
        let contents = std::fs::read_to_string(sink.daily_journal_path()).unwrap();
        assert_eq!(contents.lines().count(), 5);
    }
}
