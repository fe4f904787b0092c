use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

use crate::error::{Result, SessionError};
use crate::schema::ChatSession;

/// Load every session that parses. A missing document is an empty store; an
/// unreadable document or entry is logged and skipped.
pub(crate) fn load_sessions_best_effort(path: &Path) -> Vec<ChatSession> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No session document at {}", path.display());
            return Vec::new();
        }
        Err(err) => {
            log::error!("Failed to read chat sessions from {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let entries: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
        Ok(entries) => entries,
        Err(err) => {
            log::error!("Failed to parse chat sessions in {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let mut sessions = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ChatSession>(entry) {
            Ok(session) => sessions.push(session),
            Err(err) => log::error!("Failed to deserialize chat session #{}: {}", idx, err),
        }
    }
    sessions
}

/// Write the full session list under the advisory lock, atomically
pub(crate) fn write_sessions(path: &Path, lock_path: &Path, sessions: &[&ChatSession]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| SessionError::persist("creating session dir", parent, err))?;
    }
    let bytes = serde_json::to_vec_pretty(sessions).map_err(|err| SessionError::serialize(path, err))?;

    let _lock = acquire_session_lock(lock_path)?;
    write_atomic(path, &bytes)
}

pub(crate) struct SessionLock {
    file: File,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) fn acquire_session_lock(lock_path: &Path) -> Result<SessionLock> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|err| SessionError::persist("opening session lock", lock_path, err))?;
    file.lock_exclusive()
        .map_err(|err| SessionError::persist("locking session document", lock_path, err))?;
    Ok(SessionLock { file })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_file_name(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("chat_sessions"),
        std::process::id()
    ));

    {
        let mut file =
            File::create(&tmp).map_err(|err| SessionError::persist("creating tmp file", &tmp, err))?;
        file.write_all(bytes)
            .map_err(|err| SessionError::persist("writing tmp file", &tmp, err))?;
        file.sync_all()
            .map_err(|err| SessionError::persist("syncing tmp file", &tmp, err))?;
    }

    std::fs::rename(&tmp, path).map_err(|err| {
        let _ = std::fs::remove_file(&tmp);
        SessionError::persist("replacing session document", path, err)
    })
}
