//! Duration-anomaly detection over per-agent-type execution history.
//! Flags invocations whose duration deviates sharply from the rolling
//! baseline for that agent type, appended to `anomalies.jsonl` alongside
//! the metrics journals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use csa_core::AppError;
use serde::{Deserialize, Serialize};

const MIN_SAMPLES: usize = 5;
const DEFAULT_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: chrono::DateTime<Utc>,
    pub agent_type: String,
    pub duration_ms: u64,
    pub baseline_mean_ms: f64,
    pub baseline_stddev_ms: f64,
    pub z_score: f64,
}

/// Flag `sample` against `history` (prior durations for the same agent
/// type) when it deviates from the mean by more than `threshold` standard
/// deviations. Returns `None` when there isn't enough history yet
/// (`history.len() < MIN_SAMPLES`) or stddev is zero (no variation to
/// compare against).
pub fn detect_anomaly(history: &[Duration], sample: Duration, threshold: f64) -> Option<(f64, f64, f64)> {
    if history.len() < MIN_SAMPLES {
        return None;
    }
    let samples_ms: Vec<f64> = history.iter().map(|d| d.as_millis() as f64).collect();
    let mean = samples_ms.iter().sum::<f64>() / samples_ms.len() as f64;
    let variance = samples_ms.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples_ms.len() as f64;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return None;
    }
    let sample_ms = sample.as_millis() as f64;
    let z = (sample_ms - mean) / stddev;
    if z.abs() > threshold { Some((mean, stddev, z)) } else { None }
}

pub fn detect_anomaly_default(history: &[Duration], sample: Duration) -> Option<(f64, f64, f64)> {
    detect_anomaly(history, sample, DEFAULT_THRESHOLD)
}

pub struct AnomalyLog {
    path: PathBuf,
}

impl AnomalyLog {
    /// `path` is expected to be `memory/workflow-episodic/anomalies.jsonl`
    /// under the project data root.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn record(&self, agent_type: &str, history: &[Duration], sample: Duration) -> Result<bool, AppError> {
        let Some((mean, stddev, z)) = detect_anomaly_default(history, sample) else {
            return Ok(false);
        };
        let anomaly = Anomaly {
            timestamp: Utc::now(),
            agent_type: agent_type.to_string(),
            duration_ms: sample.as_millis() as u64,
            baseline_mean_ms: mean,
            baseline_stddev_ms: stddev,
            z_score: z,
        };
        self.append(&anomaly)?;
        Ok(true)
    }

    fn append(&self, anomaly: &Anomaly) -> Result<(), AppError> {
        use std::fs::OpenOptions;
        use std::io::Write as _;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(AppError::Io)?;
        }
        let mut line = serde_json::to_vec(anomaly).map_err(AppError::Serde)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(AppError::Io)?;
        file.write_all(&line).map_err(AppError::Io)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
