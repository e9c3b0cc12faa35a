//! In-memory store for tests and throwaway sessions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{upsert_prompt, ChatSessionStore, PromptLibrary, StoreError};
use crate::domain::{ChatThread, SystemPrompt};

#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: Mutex<BTreeMap<String, ChatThread>>,
    prompts: Mutex<Vec<SystemPrompt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved threads
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.lock().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<ChatThread> {
        self.threads.lock().get(id).cloned()
    }
}

#[async_trait]
impl ChatSessionStore for MemoryStore {
    async fn load_all(&self) -> Result<BTreeMap<String, ChatThread>, StoreError> {
        Ok(self.threads.lock().clone())
    }

    async fn save(&self, thread: &ChatThread) -> Result<(), StoreError> {
        self.threads
            .lock()
            .insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.threads.lock().remove(id).is_some())
    }
}

#[async_trait]
impl PromptLibrary for MemoryStore {
    async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, StoreError> {
        Ok(self.prompts.lock().clone())
    }

    async fn save_prompt(&self, prompt: &SystemPrompt) -> Result<(), StoreError> {
        upsert_prompt(&mut self.prompts.lock(), prompt);
        Ok(())
    }

    async fn delete_prompt(&self, id: &str) -> Result<bool, StoreError> {
        let mut prompts = self.prompts.lock();
        let before = prompts.len();
        prompts.retain(|p| p.id != id);
        Ok(prompts.len() != before)
    }
}
