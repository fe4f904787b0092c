use crate::schema::ChatSession;

/// Fire-and-forget change notifications. Implementations must not block;
/// nothing is retried.
pub trait SessionListener: Send + Sync {
    /// A session's tree was mutated and persisted
    fn tree_changed(&self, session: &ChatSession);

    /// Sessions were created, deleted, switched or their messages changed
    fn session_list_changed(&self) {}
}

/// Listener that only logs, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl SessionListener for LoggingListener {
    fn tree_changed(&self, session: &ChatSession) {
        let stats = session.app_file_tree.stats();
        log::debug!(
            "Session {} tree changed: {} files, {} classes, {} methods",
            session.id,
            stats.files,
            stats.classes,
            stats.methods
        );
    }

    fn session_list_changed(&self) {
        log::debug!("Session list changed");
    }
}
