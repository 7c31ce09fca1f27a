//! Audit & Metrics Sink (spec §4.5): append-only daily and per-session
//! audit journals, a monthly metrics journal, and a pure aggregation
//! function over a trailing window of records.

pub mod anomaly;
pub mod metrics;
pub mod record;
pub mod sanitize;
pub mod sink;

pub use anomaly::{Anomaly, AnomalyLog, detect_anomaly, detect_anomaly_default};
pub use metrics::{MetricsSummary, summarize};
pub use record::AuditRecord;
pub use sanitize::{hash_output, output_preview, sanitize_params};
pub use sink::AuditSink;
