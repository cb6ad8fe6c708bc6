//! Chat sessions.
//!
//! Named conversations with a system prompt and ordered messages. Sessions
//! form an indexed set; at most one is active at a time and serves as the
//! default target for LLM commands and message-history variable views.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NeuroError, Result};
use crate::registry::Service;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System message providing context and instructions.
    System,
    /// User message (human input).
    User,
    /// Assistant message (LLM response).
    Assistant,
}

impl ChatRole {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: ChatRole,
    /// The content of the message.
    pub content: String,
    /// Provider thinking blocks attached to assistant messages, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking_blocks: Vec<String>,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            thinking_blocks: Vec::new(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// A named chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session ID.
    pub id: String,
    /// User-chosen session name.
    pub name: String,
    /// Optional system prompt sent ahead of the conversation.
    pub system_prompt: Option<String>,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Creates an empty session.
    pub fn new(name: impl Into<String>, system_prompt: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            system_prompt,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the number of messages in the session.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// The chat session service.
pub struct ChatSessionService {
    sessions: RwLock<HashMap<String, ChatSession>>,
    active_id: RwLock<Option<String>>,
}

impl ChatSessionService {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active_id: RwLock::new(None),
        }
    }

    /// Creates a session and makes it active. Session names are unique.
    pub fn create_session(
        &self,
        name: &str,
        system_prompt: Option<String>,
    ) -> Result<ChatSession> {
        if name.is_empty() {
            return Err(NeuroError::usage("\\session-new[name=<name>]"));
        }
        let mut sessions = self.sessions.write();
        if sessions.values().any(|s| s.name == name) {
            return Err(NeuroError::execution(format!(
                "session '{}' already exists",
                name
            )));
        }
        let session = ChatSession::new(name, system_prompt);
        sessions.insert(session.id.clone(), session.clone());
        *self.active_id.write() = Some(session.id.clone());
        Ok(session)
    }

    /// Activates a session by name or ID, returning its ID.
    pub fn activate(&self, name_or_id: &str) -> Result<String> {
        let id = self
            .resolve(name_or_id)
            .ok_or_else(|| NeuroError::execution(format!("no session '{}'", name_or_id)))?;
        *self.active_id.write() = Some(id.clone());
        Ok(id)
    }

    /// Deletes a session by name or ID, clearing the active slot if needed.
    pub fn delete(&self, name_or_id: &str) -> Result<()> {
        let id = self
            .resolve(name_or_id)
            .ok_or_else(|| NeuroError::execution(format!("no session '{}'", name_or_id)))?;
        self.sessions.write().remove(&id);
        let mut active = self.active_id.write();
        if active.as_deref() == Some(id.as_str()) {
            *active = None;
        }
        Ok(())
    }

    /// Returns a copy of the active session, if any.
    pub fn active_session(&self) -> Option<ChatSession> {
        let active = self.active_id.read();
        let id = active.as_deref()?;
        self.sessions.read().get(id).cloned()
    }

    /// Finds a session by name or ID.
    pub fn find(&self, name_or_id: &str) -> Option<ChatSession> {
        let id = self.resolve(name_or_id)?;
        self.sessions.read().get(&id).cloned()
    }

    /// Appends a user message to the active session, returning the new count.
    pub fn add_user_message(&self, content: &str) -> Result<usize> {
        self.append(ChatMessage::user(content))
    }

    /// Appends an assistant message to the active session.
    pub fn add_assistant_message(&self, content: &str) -> Result<usize> {
        self.append(ChatMessage::assistant(content))
    }

    /// Returns the active session's message count.
    pub fn message_count(&self) -> Result<usize> {
        self.active_session()
            .map(|s| s.message_count())
            .ok_or_else(|| NeuroError::execution("no active session"))
    }

    /// Lists sessions ordered by creation time.
    pub fn list(&self) -> Vec<ChatSession> {
        let mut sessions: Vec<ChatSession> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    /// Returns the active session ID, if any.
    pub fn active_id(&self) -> Option<String> {
        self.active_id.read().clone()
    }

    fn append(&self, message: ChatMessage) -> Result<usize> {
        let active = self
            .active_id
            .read()
            .clone()
            .ok_or_else(|| NeuroError::execution("no active session"))?;
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&active)
            .ok_or_else(|| NeuroError::execution("no active session"))?;
        session.messages.push(message);
        session.updated_at = Utc::now();
        Ok(session.messages.len())
    }

    fn resolve(&self, name_or_id: &str) -> Option<String> {
        let sessions = self.sessions.read();
        if sessions.contains_key(name_or_id) {
            return Some(name_or_id.to_string());
        }
        sessions
            .values()
            .find(|s| s.name == name_or_id)
            .map(|s| s.id.clone())
    }
}

impl Default for ChatSessionService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for ChatSessionService {
    fn name(&self) -> &str {
        "chat"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
