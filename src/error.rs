/// Error types for the ipdedup library
use std::fmt;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DedupError>;

/// Main error type for pipeline operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupError {
    /// Source file could not be opened, even after retries
    SourceOpen(String),

    /// Source file failed mid-stream, even after retries
    SourceRead(String),

    /// Persistent dedup index errors (open, commit, scan)
    Index(String),

    /// Warnings log could not be created or written
    WarningLog(String),

    /// Invalid configuration values
    Config(String),

    /// I/O errors
    Io(String),

    /// A pipeline thread panicked
    WorkerPanicked(String),

    /// The run was cancelled before the input was fully consumed
    Cancelled,

    /// General errors
    Other(String),
}

impl DedupError {
    /// True for errors raised before any line was processed
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            DedupError::SourceOpen(_)
                | DedupError::Index(_)
                | DedupError::WarningLog(_)
                | DedupError::Config(_)
        )
    }
}

impl fmt::Display for DedupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupError::SourceOpen(msg) => write!(f, "Error opening file: {}", msg),
            DedupError::SourceRead(msg) => write!(f, "Error reading file: {}", msg),
            DedupError::Index(msg) => write!(f, "Dedup index error: {}", msg),
            DedupError::WarningLog(msg) => write!(f, "Warnings log error: {}", msg),
            DedupError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            DedupError::Io(msg) => write!(f, "I/O error: {}", msg),
            DedupError::WorkerPanicked(msg) => write!(f, "Pipeline thread panicked: {}", msg),
            DedupError::Cancelled => write!(f, "Run cancelled before completion"),
            DedupError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DedupError {}

impl From<std::io::Error> for DedupError {
    fn from(err: std::io::Error) -> Self {
        DedupError::Io(err.to_string())
    }
}

impl From<rocksdb::Error> for DedupError {
    fn from(err: rocksdb::Error) -> Self {
        DedupError::Index(err.into_string())
    }
}

impl From<serde_json::Error> for DedupError {
    fn from(err: serde_json::Error) -> Self {
        DedupError::Config(err.to_string())
    }
}

impl From<String> for DedupError {
    fn from(msg: String) -> Self {
        DedupError::Other(msg)
    }
}

impl From<&str> for DedupError {
    fn from(msg: &str) -> Self {
        DedupError::Other(msg.to_string())
    }
}
