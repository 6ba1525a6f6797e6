//! Error types for the conversation layer.

use std::fmt;

use refund_engine::EngineError;

/// Conversation layer errors
#[derive(Debug)]
pub enum ChatError {
    /// Error raised by the decision engine
    Engine(EngineError),
    /// Configuration is missing or invalid
    Config(String),
    /// Customer profile could not be read
    Profile(String),
    /// Fact extraction collaborator failed
    Extraction(String),
    /// Question generation collaborator failed
    Question(String),
    /// The conversation used up its turn allowance
    TurnLimitReached(u32),
    /// File system error
    IoError(std::io::Error),
    /// Serialization error
    SerializationError(String),
}

impl ChatError {
    /// Whether the conversation can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_recoverable(),
            Self::Extraction(_) | Self::Question(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "{}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Profile(msg) => write!(f, "Customer profile error: {}", msg),
            Self::Extraction(msg) => write!(f, "Fact extraction failed: {}", msg),
            Self::Question(msg) => write!(f, "Question generation failed: {}", msg),
            Self::TurnLimitReached(max) => write!(
                f,
                "Conversation reached the limit of {} turns; reset to start over",
                max
            ),
            Self::IoError(e) => write!(f, "I/O error: {}", e),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(e) => Some(e),
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for ChatError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for conversation operations
pub type ChatResult<T> = Result<T, ChatError>;
