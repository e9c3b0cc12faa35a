//! Durable chat state.
//!
//! Threads are kept in a map keyed by thread id; prompt presets in an
//! insertion-ordered list. Both stores implement the same traits so the
//! orchestrator and CLI never see which one is in use.

pub mod json_file;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ChatThread, SystemPrompt};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Thread persistence
#[async_trait]
pub trait ChatSessionStore: Send + Sync {
    async fn load_all(&self) -> Result<BTreeMap<String, ChatThread>, StoreError>;

    /// Insert or replace the thread under its id
    async fn save(&self, thread: &ChatThread) -> Result<(), StoreError>;

    /// Returns whether a thread was removed
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn load(&self, id: &str) -> Result<Option<ChatThread>, StoreError> {
        Ok(self.load_all().await?.remove(id))
    }
}

/// Named system prompt presets
#[async_trait]
pub trait PromptLibrary: Send + Sync {
    async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, StoreError>;

    /// Replace the preset with the same id, or append it
    async fn save_prompt(&self, prompt: &SystemPrompt) -> Result<(), StoreError>;

    async fn delete_prompt(&self, id: &str) -> Result<bool, StoreError>;

    /// Look a preset up by id or, failing that, by case-insensitive name
    async fn find_prompt(&self, key: &str) -> Result<Option<SystemPrompt>, StoreError> {
        let prompts = self.list_prompts().await?;
        let by_id = prompts.iter().position(|p| p.id == key);
        let index = by_id.or_else(|| {
            prompts
                .iter()
                .position(|p| p.name.eq_ignore_ascii_case(key))
        });
        Ok(index.map(|i| prompts[i].clone()))
    }
}

/// Threads newest-activity first, for listings
pub fn sorted_by_activity(threads: BTreeMap<String, ChatThread>) -> Vec<ChatThread> {
    let mut threads: Vec<ChatThread> = threads.into_values().collect();
    threads.sort_by(|a, b| {
        let last = |t: &ChatThread| t.last_message().map(|m| m.timestamp);
        last(b).cmp(&last(a))
    });
    threads
}

/// Upsert into an insertion-ordered preset list
pub(crate) fn upsert_prompt(prompts: &mut Vec<SystemPrompt>, prompt: &SystemPrompt) {
    match prompts.iter_mut().find(|p| p.id == prompt.id) {
        Some(existing) => *existing = prompt.clone(),
        None => prompts.push(prompt.clone()),
    }
}
