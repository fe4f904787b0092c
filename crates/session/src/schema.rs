use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use context_tree::AppFileTree;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub const SESSION_TYPE_CHAT: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(SessionError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One conversation and the context selection it carries.
///
/// `relevant_workspaces` tracks which open workspaces currently hold the
/// session and is never written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,

    #[serde(rename = "type", default = "default_session_type")]
    pub session_type: String,

    /// Workspace the session belongs to
    #[serde(default)]
    pub workspace: String,

    /// Epoch millis
    pub start_time: u64,

    #[serde(default)]
    pub app_file_tree: AppFileTree,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(skip)]
    pub relevant_workspaces: BTreeSet<String>,
}

fn default_session_type() -> String {
    SESSION_TYPE_CHAT.to_string()
}

impl ChatSession {
    /// Fresh empty chat session owned by `workspace`, started now
    pub fn new(workspace: impl Into<String>) -> Self {
        Self::started_at(workspace, now_millis())
    }

    pub fn started_at(workspace: impl Into<String>, start_time: u64) -> Self {
        let workspace = workspace.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_type: default_session_type(),
            relevant_workspaces: BTreeSet::from([workspace.clone()]),
            workspace,
            start_time,
            app_file_tree: AppFileTree::new(),
            messages: Vec::new(),
        }
    }

    pub fn push_message(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Drop every message after `index`. No-op when `index` is the last
    /// message or out of range.
    pub fn truncate_after(&mut self, index: usize) -> bool {
        if index >= self.messages.len().saturating_sub(1) {
            return false;
        }
        self.messages.truncate(index + 1);
        true
    }

    /// Transcript as `role: content` blocks separated by blank lines
    pub fn export_chat_history(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
