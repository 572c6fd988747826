//! Error types for rehearse.

use thiserror::Error;

/// Default result type for rehearse.
pub type RehearseResult<T> = Result<T, RehearseError>;

/// Everything that can go wrong in rehearse.
#[derive(Error, Debug)]
pub enum RehearseError {
    /// Bad mode, pattern or problem reference. Detected before any state
    /// is created.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No eligible problem for the requested mode/pattern.
    #[error("No problems in the catalog for {0}")]
    EmptyCatalog(String),

    /// Postmortem requested for a session that is still running or was
    /// abandoned.
    #[error("Session '{session_id}' is {status}; only completed or timed-out sessions can be recorded")]
    IncompleteSession { session_id: String, status: String },

    /// Required reflection fields are empty for a failing session.
    #[error("Missing reflection fields for a failed session: {}", .0.join(", "))]
    MissingReflection(Vec<&'static str>),

    /// A postmortem for this session id is already in the history.
    #[error("A postmortem for session '{0}' has already been recorded")]
    DuplicateRecord(String),

    /// Durable history append or read failed.
    #[error("History store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "cli")]
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(String),
}

impl RehearseError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Whether a caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Io(_))
    }
}
