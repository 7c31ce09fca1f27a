use serde::{Deserialize, Serialize};

/// Security tier classification of an operation's blast radius.
///
/// Ordering is meaningful: `T0 < T1 < T2 < T3`. The effective tier of a
/// compound command is the maximum tier of its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecurityTier {
    /// Read-only: `git status`, `kubectl get`, `terraform show`.
    T0,
    /// Local validation with no network side effects: `validate`, `lint`, `fmt`.
    T1,
    /// Simulation: remote read or dry-run (`plan`, `diff`, `--dry-run`).
    T2,
    /// State-mutating. Requires approval before execution.
    T3,
}

impl SecurityTier {
    pub fn requires_approval(self) -> bool {
        self == SecurityTier::T3
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::T0 => "T0",
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::T3 => "T3",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::T0 => "Read-only operation",
            Self::T1 => "Local validation operation",
            Self::T2 => "Simulation operation (remote read or dry-run)",
            Self::T3 => "State-mutating operation (requires approval)",
        }
    }
}

impl std::fmt::Display for SecurityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SecurityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "T0" => Ok(Self::T0),
            "T1" => Ok(Self::T1),
            "T2" => Ok(Self::T2),
            "T3" => Ok(Self::T3),
            other => Err(format!("invalid security tier '{other}'")),
        }
    }
}

/// The ordered 7-phase workflow. Transitions must go to `current + 1`
/// except for three permitted skips (see `WorkflowPhase::can_transition_to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkflowPhase {
    Clarification = 0,
    Routing = 1,
    Context = 2,
    Planning = 3,
    Approval = 4,
    Realization = 5,
    SsotUpdate = 6,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 7] = [
        Self::Clarification,
        Self::Routing,
        Self::Context,
        Self::Planning,
        Self::Approval,
        Self::Realization,
        Self::SsotUpdate,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.index() == idx)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clarification => "clarification",
            Self::Routing => "routing",
            Self::Context => "context",
            Self::Planning => "planning",
            Self::Approval => "approval",
            Self::Realization => "realization",
            Self::SsotUpdate => "ssot_update",
        }
    }

    /// True if `self -> next` is one of the permitted transitions: the
    /// natural `current + 1` successor, or one of the two documented
    /// skips (Clarification -> Routing, Routing -> Planning).
    pub fn can_transition_to(self, next: WorkflowPhase) -> bool {
        if next.index() == self.index() + 1 {
            return true;
        }
        matches!(
            (self, next),
            (Self::Clarification, Self::Routing) | (Self::Routing, Self::Planning)
        )
    }

    /// True if `phase` is a permitted initial entry point for a request.
    pub fn is_valid_start(phase: WorkflowPhase) -> bool {
        matches!(phase, Self::Clarification | Self::Routing)
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tier of a [`Finding`] produced by the five-layer agent executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingTier {
    /// Security risk or something that is actively broken.
    Critical,
    /// Doesn't follow standards but still works.
    Deviation,
    /// Could be better; never narrated unless explicitly requested.
    Improvement,
    /// A recurring pattern that will be applied automatically.
    Pattern,
}

/// Where a finding's underlying data point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingOrigin {
    /// Present only in the local repository.
    LocalOnly,
    /// Present only in the live infrastructure.
    LiveOnly,
    /// Present in both, and they agree.
    DualVerified,
    /// Present in both, and they disagree.
    Conflicting,
}

/// One observation produced by the five-layer agent executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub tier: FindingTier,
    pub origin: FindingOrigin,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl Finding {
    pub fn new(
        tier: FindingTier,
        origin: FindingOrigin,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tier,
            origin,
            title: title.into(),
            description: description.into(),
            suggested_action: None,
            details: serde_json::Map::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

/// Classification of an executed command, used for Episode bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Read,
    Create,
    Delete,
    Update,
    Plan,
    Apply,
    Git,
    CloudCli,
    Other,
}

impl OperationType {
    /// Best-effort classification from a single shell command word.
    pub fn classify(command: &str) -> Self {
        let lower = command.to_ascii_lowercase();
        let first_word = lower.split_whitespace().next().unwrap_or("");
        if first_word == "git" {
            return Self::Git;
        }
        if matches!(first_word, "gcloud" | "aws" | "az") {
            return Self::CloudCli;
        }
        if lower.contains("apply") || (lower.contains("upgrade") && lower.contains("helm")) {
            return Self::Apply;
        }
        if lower.contains("plan") || lower.contains("--dry-run") || lower.contains("diff") {
            return Self::Plan;
        }
        if lower.contains("delete") || lower.contains("destroy") || lower.contains("rm ") {
            return Self::Delete;
        }
        if lower.contains("create") || lower.contains("init") {
            return Self::Create;
        }
        if lower.contains("update") || lower.contains("patch") || lower.contains("edit") {
            return Self::Update;
        }
        if lower.contains("get")
            || lower.contains("describe")
            || lower.contains("show")
            || lower.contains("list")
            || lower.contains("status")
        {
            return Self::Read;
        }
        Self::Other
    }
}
