//! Layer C — finding classification. Turns Layer B's discrepancies and
//! extractor output into tiered, originated findings, decides whether
//! to escalate to Layer D, and renders the concise human report.

use csa_core::{Finding, FindingOrigin, FindingTier};

use crate::discovery::DiscoveryResult;

const REPORT_MAX_CHARS: usize = 500;

/// Build the finding set for one Layer B discovery pass.
///
/// Every discrepancy becomes a `Deviation` finding (`LocalOnly`, since
/// Layer B never touches live infrastructure). A clean coherence check
/// becomes a `Pattern` finding recording what was verified.
pub fn classify_findings(discovery: &DiscoveryResult) -> Vec<Finding> {
    let mut findings = Vec::new();

    for discrepancy in &discovery.discrepancies {
        findings.push(
            Finding::new(FindingTier::Deviation, FindingOrigin::LocalOnly, "internal coherence violation", &discrepancy.description)
                .with_suggestion("reconcile the mismatched fields before proceeding"),
        );
    }

    for check in &discovery.internal_coherence {
        findings.push(Finding::new(FindingTier::Pattern, FindingOrigin::LocalOnly, "coherence check passed", check));
    }

    findings
}

/// `true` when at least one `CRITICAL` or `DEVIATION` finding is present.
pub fn should_escalate_to_live(findings: &[Finding]) -> bool {
    findings
        .iter()
        .any(|f| matches!(f.tier, FindingTier::Critical | FindingTier::Deviation))
}

/// Render the ≤500-character visible-prose report: every `CRITICAL`
/// finding, the first `DEVIATION` with a count of the rest, no
/// `IMPROVEMENT` findings, a single `PATTERN` count line, and one
/// data-origin summary line.
pub fn concise_report(findings: &[Finding]) -> String {
    let criticals: Vec<&Finding> = findings.iter().filter(|f| matches!(f.tier, FindingTier::Critical)).collect();
    let deviations: Vec<&Finding> = findings.iter().filter(|f| matches!(f.tier, FindingTier::Deviation)).collect();
    let patterns = findings.iter().filter(|f| matches!(f.tier, FindingTier::Pattern)).count();

    let mut lines = Vec::new();
    for finding in &criticals {
        lines.push(format!("CRITICAL: {}", finding.title));
    }
    if let Some(first) = deviations.first() {
        if deviations.len() > 1 {
            lines.push(format!("DEVIATION: {} (+{} more)", first.title, deviations.len() - 1));
        } else {
            lines.push(format!("DEVIATION: {}", first.title));
        }
    }
    if patterns > 0 {
        lines.push(format!("{patterns} pattern(s) recognized"));
    }
    lines.push(format!("data origins: {}", origin_summary(findings)));

    let mut report = lines.join("; ");
    if report.chars().count() > REPORT_MAX_CHARS {
        report = report.chars().take(REPORT_MAX_CHARS - 1).collect::<String>() + "\u{2026}";
    }
    report
}

fn origin_summary(findings: &[Finding]) -> String {
    let local = findings.iter().filter(|f| matches!(f.origin, FindingOrigin::LocalOnly)).count();
    let live = findings.iter().filter(|f| matches!(f.origin, FindingOrigin::LiveOnly)).count();
    let dual = findings.iter().filter(|f| matches!(f.origin, FindingOrigin::DualVerified)).count();
    let conflicting = findings.iter().filter(|f| matches!(f.origin, FindingOrigin::Conflicting)).count();
    format!("{local} local-only, {live} live-only, {dual} dual-verified, {conflicting} conflicting")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Discrepancy;

    fn discovery_with(discrepancies: Vec<&str>, coherence: Vec<&str>) -> DiscoveryResult {
        DiscoveryResult {
            discrepancies: discrepancies.into_iter().map(|d| Discrepancy { description: d.to_string() }).collect(),
            internal_coherence: coherence.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn discrepancies_become_deviation_findings() {
        let discovery = discovery_with(vec!["releaseName mismatch"], vec![]);
        let findings = classify_findings(&discovery);
        assert_eq!(findings.len(), 1);
        assert!(matches!(findings[0].tier, FindingTier::Deviation));
    }

    #[test]
    fn escalates_on_deviation() {
        let discovery = discovery_with(vec!["mismatch"], vec![]);
        let findings = classify_findings(&discovery);
        assert!(should_escalate_to_live(&findings));
    }

    #[test]
    fn no_escalation_without_critical_or_deviation() {
        let discovery = discovery_with(vec![], vec!["all good"]);
        let findings = classify_findings(&discovery);
        assert!(!should_escalate_to_live(&findings));
    }

    #[test]
    fn concise_report_stays_under_budget() {
        let mut findings = Vec::new();
        for i in 0..10 {
            findings.push(Finding::new(
                FindingTier::Deviation,
                FindingOrigin::LocalOnly,
                format!("deviation {i}"),
                "detail",
            ));
        }
        let report = concise_report(&findings);
        assert!(report.chars().count() <= REPORT_MAX_CHARS);
        assert!(report.contains("+9 more"));
    }

    #[test]
    fn report_omits_improvement_findings() {
        let findings = vec![Finding::new(
            FindingTier::Improvement,
            FindingOrigin::LocalOnly,
            "could use a cleaner module layout",
            "detail",
        )];
        let report = concise_report(&findings);
        assert!(!report.contains("could use"));
    }
}
