//! Error types for folio.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for folio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing file, document, or item id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Project creation target is not an empty directory
    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// A source folder with the derived name already exists
    #[error("Folder conflict: {0}")]
    FolderConflict(String),

    /// Directory has no project marker document
    #[error("Not a project: {}", .0.display())]
    NotAProject(PathBuf),

    /// Document bytes could not be decoded into the expected structure
    #[error("Format error: {0}")]
    Format(String),

    /// Document violates its registered schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure or non-success status from the model service
    #[error("Network error: {0}")]
    Network(String),

    /// Request to the model service exceeded its timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from talking to the model service.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}
