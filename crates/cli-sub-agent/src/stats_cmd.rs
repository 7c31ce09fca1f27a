use anyhow::Result;
use csa_audit::{AuditSink, summarize};

pub fn run(days: i64) -> Result<()> {
    let logs_dir = csa_config::paths::logs_dir()?;
    let metrics_dir = csa_config::paths::metrics_dir()?;
    let sink = AuditSink::new(logs_dir, metrics_dir);
    let records = sink.read_metrics_records(days);
    let summary = summarize(&records);

    println!("window_days:     {days}");
    println!("total:           {}", summary.total);
    println!("success_rate:    {:.1}%", summary.success_rate * 100.0);
    println!("avg_duration_ms: {:.1}", summary.avg_duration_ms);

    let mut tiers: Vec<_> = summary.tier_distribution.iter().collect();
    tiers.sort_by(|a, b| a.0.cmp(b.0));
    println!("tiers:");
    for (tier, count) in tiers {
        println!("  {tier}: {count}");
    }

    println!("top command types:");
    for (kind, count) in &summary.top_types {
        println!("  {kind}: {count}");
    }

    Ok(())
}
