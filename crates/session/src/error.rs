use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Writing the session document failed; in-memory state is kept
    #[error("Persist error while {operation} at {path}: {source}")]
    Persist {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize sessions for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Unknown chat role: {0}")]
    UnknownRole(String),

    #[error("Session file location unavailable: no home directory and {env} is unset")]
    NoSessionPath { env: &'static str },
}

impl SessionError {
    #[must_use]
    pub fn persist(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialize {
            path: path.into(),
            source,
        }
    }
}
