//! Error types for session handling and content loading

use std::path::PathBuf;

/// Errors raised while reading or mutating a session.
///
/// None of these are fatal to a conversation: the router turns them into a
/// re-prompt and keeps the session alive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid field for this persona: {field}")]
    InvalidField { field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("ambiguous intent, could mean any of: {}", candidates.join(", "))]
    AmbiguousIntent { candidates: Vec<String> },
}

impl SessionError {
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "session",
            id: id.into(),
        }
    }

    pub fn topic_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "topic",
            id: id.into(),
        }
    }

    /// Stable code used on the IPC wire
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidField { .. } => "invalid_field",
            Self::InvalidValue { .. } => "invalid_value",
            Self::AmbiguousIntent { .. } => "ambiguous_intent",
        }
    }
}

/// Errors raised while loading the static content file.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse content: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate content id: {0}")]
    DuplicateId(String),

    #[error("content item {0} has an empty id")]
    EmptyId(usize),

    #[error("content item {0} has an empty summary")]
    EmptySummary(String),

    #[error("content item {0} has an empty sample question")]
    EmptyQuestion(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
