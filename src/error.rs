// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for status-sync
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific file
    #[error("Failed to access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Field lookup on a stanza that does not carry the key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Field line rejected by the strict decoder
    #[error("Malformed field line {line}: {content:?}")]
    MalformedFieldLine { line: usize, content: String },

    /// Status database is not valid UTF-8
    #[error("Invalid UTF-8 in {}", .path.display())]
    InvalidEncoding { path: PathBuf },
}

impl Error {
    /// Attach a path to an I/O error
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using status-sync's Error type
pub type Result<T> = std::result::Result<T, Error>;
