use std::collections::HashMap;
use std::sync::Arc;

use context_tree::{
    AppFileTree, ClassFacts, MethodFacts, MutationOutcome, RemovalTarget, SelectedFile, WorkspaceRef,
};

use crate::error::{Result, SessionError};
use crate::listener::SessionListener;
use crate::paths::StoreConfig;
use crate::persist::{load_sessions_best_effort, write_sessions};
use crate::schema::{now_millis, ChatMessage, ChatRole, ChatSession};

/// Owns every chat session, picks the current one per workspace and exposes
/// the tree and message edits on it.
///
/// Each edit mutates memory first, then writes the whole session list, then
/// notifies listeners. A failed write is returned to the caller and the
/// in-memory edit is kept.
pub struct SessionStore {
    config: StoreConfig,
    sessions: HashMap<String, ChatSession>,
    /// workspace name → current session id
    current: HashMap<String, String>,
    listeners: Vec<Arc<dyn SessionListener>>,
}

impl SessionStore {
    /// Load the session document. Unreadable content is logged and dropped.
    pub fn open(config: StoreConfig) -> Self {
        let loaded = load_sessions_best_effort(&config.session_file);
        log::info!(
            "Loaded {} chat sessions from {}",
            loaded.len(),
            config.session_file.display()
        );
        let sessions = loaded
            .into_iter()
            .map(|session| (session.id.clone(), session))
            .collect();
        Self {
            config,
            sessions,
            current: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn add_listener(&mut self, listener: Arc<dyn SessionListener>) {
        self.listeners.push(listener);
    }

    /// Write every session to disk
    pub fn flush(&self) -> Result<()> {
        let mut sessions: Vec<&ChatSession> = self.sessions.values().collect();
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        write_sessions(&self.config.session_file, &self.config.lock_file(), &sessions)
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.get(id)
    }

    /// All sessions, most recently started first
    pub fn sessions(&self) -> Vec<&ChatSession> {
        let mut sessions: Vec<&ChatSession> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Current session of a workspace: the one already selected, else its
    /// latest-started session, else a fresh empty one (written on the next edit).
    pub fn current_session(&mut self, workspace: &str) -> &ChatSession {
        let id = self.current_id(workspace);
        self.session_entry(&id, workspace)
    }

    /// Start a new session for the workspace and make it current
    pub fn create_session(&mut self, workspace: &str) -> Result<String> {
        if let Some(previous) = self
            .current
            .get(workspace)
            .and_then(|id| self.sessions.get_mut(id))
        {
            previous.relevant_workspaces.remove(workspace);
        }

        let id = self.insert_new_session(workspace);
        log::info!("Created chat session {} for {}", id, workspace);
        self.flush()?;
        self.notify_session_list_changed();
        Ok(id)
    }

    /// Switch the workspace to an existing session
    pub fn set_current_session(&mut self, workspace: &str, id: &str) -> Result<()> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        session.relevant_workspaces.insert(workspace.to_string());
        self.current.insert(workspace.to_string(), id.to_string());

        self.notify_tree_changed(id);
        self.notify_session_list_changed();
        Ok(())
    }

    /// Release the workspace's hold on its current session; the session stays
    pub fn dispose(&mut self, workspace: &str) {
        if let Some(id) = self.current.remove(workspace) {
            if let Some(session) = self.sessions.get_mut(&id) {
                session.relevant_workspaces.remove(workspace);
            }
        }
    }

    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        if self.sessions.remove(id).is_none() {
            return Err(SessionError::UnknownSession(id.to_string()));
        }
        self.current.retain(|_, current| current != id);
        log::info!("Deleted chat session {}", id);

        self.flush()?;
        self.notify_session_list_changed();
        Ok(())
    }

    pub fn add_file(&mut self, workspace: &WorkspaceRef, file: &SelectedFile) -> Result<MutationOutcome> {
        self.mutate_tree(&workspace.name, |tree| tree.add_file(workspace, file))
    }

    pub fn add_method(&mut self, class: &ClassFacts, method: &MethodFacts) -> Result<MutationOutcome> {
        self.mutate_tree(&class.workspace.name, |tree| tree.add_method(class, method))
    }

    pub fn remove_selected(&mut self, workspace: &str, target: &RemovalTarget) -> Result<MutationOutcome> {
        self.mutate_tree(workspace, |tree| tree.remove_selected(workspace, target))
    }

    /// Replace the current session's tree with a freshly built one
    pub fn replace_tree(&mut self, workspace: &str, built: AppFileTree) -> Result<MutationOutcome> {
        self.mutate_tree(workspace, |tree| {
            if *tree == built {
                return MutationOutcome::Unchanged;
            }
            *tree = built;
            MutationOutcome::Changed
        })
    }

    /// Fold a freshly built tree into the current session's tree
    pub fn merge_tree(&mut self, workspace: &str, built: AppFileTree) -> Result<MutationOutcome> {
        self.mutate_tree(workspace, |tree| {
            let before = tree.clone();
            tree.merge(built);
            if *tree == before {
                MutationOutcome::Unchanged
            } else {
                MutationOutcome::Changed
            }
        })
    }

    /// Append to the current session's log. Returns the message index.
    pub fn append_message(&mut self, workspace: &str, role: ChatRole, content: impl Into<String>) -> Result<usize> {
        let id = self.current_id(workspace);
        let index = self.session_entry(&id, workspace).push_message(ChatMessage::new(role, content));
        self.flush()?;
        self.notify_session_list_changed();
        Ok(index)
    }

    /// Drop every message after `index`. Returns whether anything was removed.
    pub fn truncate_messages_after(&mut self, workspace: &str, index: usize) -> Result<bool> {
        let id = self.current_id(workspace);
        if !self.session_entry(&id, workspace).truncate_after(index) {
            return Ok(false);
        }
        self.flush()?;
        self.notify_session_list_changed();
        Ok(true)
    }

    pub fn export_chat_history(&mut self, workspace: &str) -> String {
        self.current_session(workspace).export_chat_history()
    }

    fn mutate_tree(
        &mut self,
        workspace: &str,
        edit: impl FnOnce(&mut AppFileTree) -> MutationOutcome,
    ) -> Result<MutationOutcome> {
        let id = self.current_id(workspace);
        let outcome = edit(&mut self.session_entry(&id, workspace).app_file_tree);
        if let MutationOutcome::Skipped(reason) = &outcome {
            log::warn!("{}", reason);
            return Ok(outcome);
        }

        self.flush()?;
        self.notify_tree_changed(&id);
        Ok(outcome)
    }

    fn current_id(&mut self, workspace: &str) -> String {
        if let Some(id) = self.current.get(workspace) {
            if self.sessions.contains_key(id) {
                return id.clone();
            }
        }

        let latest = self
            .sessions
            .values()
            .filter(|s| s.workspace == workspace)
            .max_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)))
            .map(|s| s.id.clone());

        match latest {
            Some(id) => {
                self.session_entry(&id, workspace)
                    .relevant_workspaces
                    .insert(workspace.to_string());
                self.current.insert(workspace.to_string(), id.clone());
                id
            }
            None => self.insert_new_session(workspace),
        }
    }

    fn insert_new_session(&mut self, workspace: &str) -> String {
        // Later sessions must sort after earlier ones even within one millisecond
        let start_time = self
            .sessions
            .values()
            .filter(|s| s.workspace == workspace)
            .map(|s| s.start_time + 1)
            .max()
            .map_or_else(now_millis, |next| next.max(now_millis()));

        let session = ChatSession::started_at(workspace, start_time);
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.current.insert(workspace.to_string(), id.clone());
        id
    }

    /// Session by id; ids handed out by `current_id` are always present
    fn session_entry(&mut self, id: &str, workspace: &str) -> &mut ChatSession {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| ChatSession {
                id: id.to_string(),
                ..ChatSession::new(workspace)
            })
    }

    fn notify_tree_changed(&self, id: &str) {
        if let Some(session) = self.sessions.get(id) {
            for listener in &self.listeners {
                listener.tree_changed(session);
            }
        }
    }

    fn notify_session_list_changed(&self) {
        for listener in &self.listeners {
            listener.session_list_changed();
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session_file", &self.config.session_file)
            .field("sessions", &self.sessions.len())
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
