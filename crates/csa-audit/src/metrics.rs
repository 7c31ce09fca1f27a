//! Pure aggregation over audit records into a rolling summary (spec §4.5).
//! Safe to call concurrently: it only reads files and does no mutation.

use std::collections::HashMap;

use csa_core::{OperationType, SecurityTier};
use serde::Serialize;

use crate::record::AuditRecord;

#[derive(Debug, Clone, Serialize, Default)]
pub struct MetricsSummary {
    pub total: usize,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub command_type_distribution: HashMap<String, usize>,
    pub tier_distribution: HashMap<String, usize>,
    pub top_types: Vec<(String, usize)>,
}

/// Aggregate `records` (already filtered to the trailing window by the
/// caller) into a summary. Pure: no I/O, safe under concurrent reads.
pub fn summarize(records: &[AuditRecord]) -> MetricsSummary {
    if records.is_empty() {
        return MetricsSummary::default();
    }

    let total = records.len();
    let successes = records.iter().filter(|r| r.exit_code == 0).count();
    let success_rate = successes as f64 / total as f64;
    let avg_duration_ms =
        records.iter().map(|r| r.duration_ms as f64).sum::<f64>() / total as f64;

    let mut command_type_distribution: HashMap<String, usize> = HashMap::new();
    let mut tier_distribution: HashMap<String, usize> = HashMap::new();

    for record in records {
        let op_type = OperationType::classify(&record.command);
        *command_type_distribution
            .entry(format!("{op_type:?}").to_ascii_lowercase())
            .or_insert(0) += 1;
        *tier_distribution.entry(tier_key(record.tier)).or_insert(0) += 1;
    }

    let mut top_types: Vec<(String, usize)> = command_type_distribution
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    top_types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_types.truncate(5);

    MetricsSummary {
        total,
        success_rate,
        avg_duration_ms,
        command_type_distribution,
        tier_distribution,
        top_types,
    }
}

fn tier_key(tier: SecurityTier) -> String {
    tier.as_str().to_string()
}
