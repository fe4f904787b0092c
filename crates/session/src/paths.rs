use std::path::{Path, PathBuf};

use crate::error::{Result, SessionError};

pub const SESSION_FILE_ENV: &str = "CONTEXT_TREE_SESSION_FILE";
pub const CONTEXT_TREE_DIR: &str = ".context-tree";
pub const SESSION_FILE_NAME: &str = "chat_sessions.json";

/// Where the session document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub session_file: PathBuf,
}

impl StoreConfig {
    pub fn new(session_file: impl Into<PathBuf>) -> Self {
        Self {
            session_file: session_file.into(),
        }
    }

    /// Explicit path, then `CONTEXT_TREE_SESSION_FILE`, then
    /// `~/.context-tree/chat_sessions.json`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(path) = env_session_file() {
            return Ok(Self::new(path));
        }
        default_session_file()
            .map(Self::new)
            .ok_or(SessionError::NoSessionPath {
                env: SESSION_FILE_ENV,
            })
    }

    /// Advisory lock file kept beside the document
    pub fn lock_file(&self) -> PathBuf {
        self.session_file.with_extension("lock")
    }
}

fn env_session_file() -> Option<PathBuf> {
    let raw = std::env::var(SESSION_FILE_ENV).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

pub fn default_session_file() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(CONTEXT_TREE_DIR).join(SESSION_FILE_NAME))
}
