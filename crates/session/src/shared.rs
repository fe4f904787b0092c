use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use context_tree::AppFileTree;

use crate::paths::StoreConfig;
use crate::schema::ChatSession;
use crate::store::SessionStore;

/// Cloneable handle that serializes every store call behind one lock.
///
/// Renders should work on [`SharedSessionStore::snapshot_tree`] so they never
/// observe a tree mid-edit and never hold the lock while reading source.
#[derive(Clone, Debug)]
pub struct SharedSessionStore {
    inner: Arc<Mutex<SessionStore>>,
}

impl SharedSessionStore {
    pub fn new(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn open(config: StoreConfig) -> Self {
        Self::new(SessionStore::open(config))
    }

    /// Run `f` with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionStore) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Copy of the workspace's current tree
    pub fn snapshot_tree(&self, workspace: &str) -> AppFileTree {
        self.lock().current_session(workspace).app_file_tree.clone()
    }

    pub fn snapshot_session(&self, workspace: &str) -> ChatSession {
        self.lock().current_session(workspace).clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionStore> {
        // A panic inside `with` leaves the last fully applied edit in place
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
