#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("policy denied command '{command}': {reason}")]
    PolicyDenial { command: String, reason: String },

    #[error("guard '{guard}' failed: {reason}")]
    GuardFailure { guard: String, reason: String },

    #[error("execution failed after {attempts} attempt(s): {message}")]
    ExecutionFailure { attempts: u32, message: String },

    #[error("approval rejected for operation '{operation}'")]
    ApprovalRejected { operation: String },

    #[error("store corrupted at '{path}': {reason}")]
    StoreCorruption { path: String, reason: String },

    #[error("transient error, retry may succeed: {0}")]
    Transient(String),

    #[error("no session matching prefix '{0}'")]
    SessionNotFound(String),

    #[error("ambiguous session prefix '{0}': matches multiple sessions")]
    AmbiguousSessionPrefix(String),

    #[error("invalid workflow phase transition from '{from}' to '{to}'")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("project root not found")]
    ProjectRootNotFound,

    #[error("tool '{0}' is not installed")]
    ToolNotInstalled(String),

    #[error("pending update '{0}' not found")]
    UpdateNotFound(String),

    #[error("pending update '{id}' is already {status}")]
    UpdateAlreadyResolved { id: String, status: String },

    #[error("failed to acquire store lock: {0}")]
    LockError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
