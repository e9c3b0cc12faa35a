//! Chat threads and system prompt presets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, Role};

/// Default cap on retained messages per thread
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// Title length derived from the first user message
const TITLE_CHARS: usize = 50;

/// An ordered conversation with its system prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: String,

    /// Empty until the first user message arrives
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub system_prompt: String,

    /// Ordered by creation time
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChatThread {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), system_prompt)
    }

    pub fn with_id(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    /// Append a message, deriving the title from the first user message
    pub fn push(&mut self, message: Message) {
        if self.title.is_empty() && message.role == Role::User {
            self.title = message.content.trim().chars().take(TITLE_CHARS).collect();
        }
        self.messages.push(message);
    }

    /// Keep only the most recent `max` messages. Idempotent.
    pub fn truncate_to(&mut self, max: usize) {
        if self.messages.len() > max {
            let excess = self.messages.len() - max;
            self.messages.drain(..excess);
        }
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// A named system prompt preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub id: String,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SystemPrompt {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
