//! GitOps-specific verb rules for `kubectl`, `helm`, and `flux`, applied by
//! the Policy Engine on top of the generic tier/pattern checks. GitOps
//! workflows favor reconciliation via committed manifests over direct
//! cluster mutation, so read commands are always safe and mutating verbs
//! are forbidden unless explicitly dry-run.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitOpsValidationResult {
    pub allowed: bool,
    pub reason: String,
    pub severity: Severity,
    pub suggestions: Vec<String>,
}

const SAFE_KUBECTL: &[&str] = &[
    r"kubectl\s+get",
    r"kubectl\s+describe",
    r"kubectl\s+logs",
    r"kubectl\s+top",
    r"kubectl\s+explain",
    r"kubectl\s+version",
    r"kubectl\s+cluster-info",
    r"kubectl\s+config\s+view",
    r"kubectl\s+api-resources",
    r"kubectl\s+api-versions",
];

const SAFE_FLUX: &[&str] = &[
    r"flux\s+get",
    r"flux\s+check",
    r"flux\s+version",
    r"flux\s+logs",
    r"flux\s+stats",
    r"flux\s+tree",
];

const SAFE_HELM: &[&str] = &[
    r"helm\s+list",
    r"helm\s+status",
    r"helm\s+history",
    r"helm\s+template",
    r"helm\s+lint",
    r"helm\s+version",
    r"helm\s+show",
    r"helm\s+search",
];

const FORBIDDEN_KUBECTL: &[&str] = &[
    r"kubectl\s+apply(?!\s+.*--dry-run)",
    r"kubectl\s+create(?!\s+.*--dry-run)",
    r"kubectl\s+patch",
    r"kubectl\s+replace",
    r"kubectl\s+delete",
    r"kubectl\s+scale",
    r"kubectl\s+rollout\s+restart",
    r"kubectl\s+annotate(?!\s+.*--dry-run)",
    r"kubectl\s+label(?!\s+.*--dry-run)",
];

const FORBIDDEN_FLUX: &[&str] = &[
    r"flux\s+create",
    r"flux\s+delete",
    r"flux\s+suspend",
    r"flux\s+resume",
];

const FORBIDDEN_HELM: &[&str] = &[
    r"helm\s+install(?!\s+.*--dry-run)",
    r"helm\s+upgrade(?!\s+.*--dry-run)",
    r"helm\s+uninstall",
    r"helm\s+rollback",
];

fn compiled(patterns: &'static [&'static str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid gitops pattern"))
        .collect()
}

fn safe_patterns() -> &'static [Regex] {
    static RES: std::sync::OnceLock<Vec<Regex>> = std::sync::OnceLock::new();
    RES.get_or_init(|| {
        [SAFE_KUBECTL, SAFE_FLUX, SAFE_HELM]
            .into_iter()
            .flat_map(compiled)
            .collect()
    })
}

fn forbidden_patterns() -> &'static [Regex] {
    static RES: std::sync::OnceLock<Vec<Regex>> = std::sync::OnceLock::new();
    RES.get_or_init(|| {
        [FORBIDDEN_KUBECTL, FORBIDDEN_FLUX, FORBIDDEN_HELM]
            .into_iter()
            .flat_map(compiled)
            .collect()
    })
}

/// True if `command` matches an explicit safe (read-only) GitOps pattern.
pub fn is_safe_gitops_command(command: &str) -> bool {
    safe_patterns().iter().any(|re| re.is_match(command))
}

/// True if `command` matches an explicit forbidden (state-mutating) pattern.
pub fn is_forbidden_gitops_command(command: &str) -> bool {
    forbidden_patterns().iter().any(|re| re.is_match(command))
}

/// True if `command` starts with one of the tools GitOps rules govern.
pub fn is_gitops_command(command: &str) -> bool {
    let trimmed = command.trim_start();
    trimmed.starts_with("kubectl")
        || trimmed.starts_with("helm")
        || trimmed.starts_with("flux")
        || trimmed.starts_with("gcloud container")
        || trimmed.starts_with("gcloud sql")
}

/// True if `command` needs ambient credentials and does not itself load
/// them (e.g. a preceding `gcloud auth` or `kubectl config use-context`).
pub fn requires_credentials(command: &str) -> bool {
    is_gitops_command(command)
}

/// Validate `command` against GitOps workflow principles. `agent_type`, when
/// `"gitops-operator"`, applies a stricter rule requiring `--dry-run` on any
/// apply/create verb that would otherwise fall through to the permissive
/// default.
pub fn validate_gitops_workflow(command: &str, agent_type: Option<&str>) -> GitOpsValidationResult {
    if is_safe_gitops_command(command) {
        return GitOpsValidationResult {
            allowed: true,
            reason: "Read-only operation - safe to execute".into(),
            severity: Severity::Info,
            suggestions: Vec::new(),
        };
    }

    if is_forbidden_gitops_command(command) {
        let mut suggestions = Vec::new();
        if command.contains("kubectl apply") && !command.contains("--dry-run") {
            suggestions.push("Use: kubectl apply --dry-run=client -f <file>".to_string());
            suggestions.push("Create manifests in gitops repository first".to_string());
            suggestions.push("Commit changes and let Flux CD reconcile".to_string());
        } else if command.contains("flux reconcile") && !command.contains("--dry-run") {
            suggestions.push("Use: flux reconcile <resource> --dry-run".to_string());
            suggestions
                .push("Follow GitOps workflow: commit -> push -> automatic reconciliation".to_string());
        } else if command.contains("helm install") || command.contains("helm upgrade") {
            suggestions.push("Use: helm template or helm upgrade --dry-run".to_string());
            suggestions.push("Deploy via HelmRelease manifests in gitops repository".to_string());
        } else {
            suggestions.push("Use read-only commands or --dry-run alternatives".to_string());
        }

        return GitOpsValidationResult {
            allowed: false,
            reason: "Command violates GitOps principles - modifies cluster state directly".into(),
            severity: Severity::Critical,
            suggestions,
        };
    }

    if agent_type == Some("gitops-operator")
        && (command.contains("apply") || command.contains("create"))
        && !command.contains("--dry-run")
    {
        return GitOpsValidationResult {
            allowed: false,
            reason: "GitOps operator must use --dry-run for all apply operations".into(),
            severity: Severity::High,
            suggestions: vec!["Add --dry-run=client flag to command".to_string()],
        };
    }

    GitOpsValidationResult {
        allowed: true,
        reason: "Command not explicitly validated - proceed with caution".into(),
        severity: Severity::Warning,
        suggestions: vec!["Verify command follows GitOps principles".to_string()],
    }
}
