//! Error types for the engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while building graphs or driving a session.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown fact key: {0}")]
    UnknownFactKey(String),

    #[error("Invalid value '{value}' for fact '{key}' (allowed: {allowed})")]
    InvalidFactValue {
        key: String,
        value: String,
        allowed: String,
    },

    #[error("Fact '{0}' comes from the customer profile and is read-only")]
    ProfileFieldReadOnly(String),

    #[error("A customer profile is already attached to this fact store")]
    ProfileAlreadyAttached,

    #[error("Unknown node id: {0}")]
    UnknownNodeId(String),

    #[error("Decision graph failed validation ({} violation(s)): {}", violations.len(), violations.join("; "))]
    GraphIntegrity { violations: Vec<String> },

    #[error("Traversal already finished at node '{0}'; reset the session first")]
    TraversalFinished(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Whether the error only rejects input and leaves the session usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownFactKey(_)
                | EngineError::InvalidFactValue { .. }
                | EngineError::ProfileFieldReadOnly(_)
        )
    }
}
