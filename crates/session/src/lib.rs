//! # Context Session
//!
//! Chat sessions that each own a context tree, with per-workspace selection of
//! the current session and whole-document JSON persistence.
//!
//! ## Architecture
//!
//! ```text
//! caller (CLI / UI)
//!     │
//!     ├──> SharedSessionStore (Arc<Mutex<_>>, snapshots for rendering)
//!     │
//!     └──> SessionStore
//!            ├─ current session per workspace (latest start time)
//!            ├─ tree edits → context_tree mutator
//!            ├─ persist: whole list, fs2 lock, tmp + rename
//!            └─ notify: SessionListener
//! ```

mod error;
mod listener;
mod paths;
mod persist;
mod schema;
mod shared;
mod store;

pub use error::{Result, SessionError};
pub use listener::{LoggingListener, SessionListener};
pub use paths::{default_session_file, StoreConfig, CONTEXT_TREE_DIR, SESSION_FILE_ENV, SESSION_FILE_NAME};
pub use schema::{now_millis, ChatMessage, ChatRole, ChatSession, SESSION_TYPE_CHAT};
pub use shared::SharedSessionStore;
pub use store::SessionStore;
