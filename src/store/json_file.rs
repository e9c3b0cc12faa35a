//! JSON-file store under `$PARLEY_HOME`.
//!
//! `chats.json` holds `{id: thread}`, `prompts.json` the preset list. Every
//! mutation is a read-modify-write under an exclusive lock on `store.lock`,
//! and files are replaced atomically so readers never see a partial write.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::{upsert_prompt, ChatSessionStore, PromptLibrary, StoreError};
use crate::domain::{ChatThread, SystemPrompt};

const CHATS_FILE: &str = "chats.json";
const PROMPTS_FILE: &str = "prompts.json";
const LOCK_FILE: &str = "store.lock";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the configured home directory
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::config::parley_home()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chats_path(&self) -> PathBuf {
        self.root.join(CHATS_FILE)
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.root.join(PROMPTS_FILE)
    }

    /// Run `f` while holding the store lock
    fn locked<T>(&self, f: impl FnOnce(&Self) -> Result<T, StoreError>) -> Result<T, StoreError> {
        fs::create_dir_all(&self.root)?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILE))?;
        lock.lock_exclusive()?;

        // Released when `lock` is dropped
        f(self)
    }

    /// Run a locked operation off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.locked(f))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn read_chats(&self) -> Result<BTreeMap<String, ChatThread>, StoreError> {
        read_json(&self.chats_path())
    }

    fn read_prompts(&self) -> Result<Vec<SystemPrompt>, StoreError> {
        read_json(&self.prompts_path())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

/// Missing or blank files read as the empty value
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ChatSessionStore for JsonFileStore {
    async fn load_all(&self) -> Result<BTreeMap<String, ChatThread>, StoreError> {
        self.blocking(|store| store.read_chats()).await
    }

    async fn save(&self, thread: &ChatThread) -> Result<(), StoreError> {
        let thread = thread.clone();
        self.blocking(move |store| {
            let mut all = store.read_chats()?;
            all.insert(thread.id.clone(), thread);
            store.write_json(&store.chats_path(), &all)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.blocking(move |store| {
            let mut all = store.read_chats()?;
            let removed = all.remove(&id).is_some();
            if removed {
                store.write_json(&store.chats_path(), &all)?;
            }
            Ok(removed)
        })
        .await
    }
}

#[async_trait]
impl PromptLibrary for JsonFileStore {
    async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, StoreError> {
        self.blocking(|store| store.read_prompts()).await
    }

    async fn save_prompt(&self, prompt: &SystemPrompt) -> Result<(), StoreError> {
        let prompt = prompt.clone();
        self.blocking(move |store| {
            let mut all = store.read_prompts()?;
            upsert_prompt(&mut all, &prompt);
            store.write_json(&store.prompts_path(), &all)
        })
        .await
    }

    async fn delete_prompt(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.blocking(move |store| {
            let mut all = store.read_prompts()?;
            let before = all.len();
            all.retain(|p| p.id != id);
            let removed = all.len() != before;
            if removed {
                store.write_json(&store.prompts_path(), &all)?;
            }
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_delete_thread() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path().join("home"));

        let mut thread = ChatThread::with_id("t1", "Be brief.");
        thread.push(Message::user("Hello there"));
        store.save(&thread).await.unwrap();

        let reopened = JsonFileStore::new(temp.path().join("home"));
        let all = reopened.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["t1"], thread);

        assert!(reopened.delete("t1").await.unwrap());
        assert!(!reopened.delete("t1").await.unwrap());
        assert!(reopened.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_by_id() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());

        let mut thread = ChatThread::with_id("t1", "");
        store.save(&thread).await.unwrap();
        thread.push(Message::user("second save"));
        store.save(&thread).await.unwrap();

        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.title, "second save");
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .save(&ChatThread::with_id(format!("t{}", i), ""))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load_all().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_prompt_library() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        assert!(store.list_prompts().await.unwrap().is_empty());

        let coach = SystemPrompt::new("Coach", "Be encouraging.");
        let terse = SystemPrompt::new("Terse", "One sentence answers.");
        store.save_prompt(&coach).await.unwrap();
        store.save_prompt(&terse).await.unwrap();

        let found = store.find_prompt("coach").await.unwrap().unwrap();
        assert_eq!(found.id, coach.id);

        assert!(store.delete_prompt(&coach.id).await.unwrap());
        let names: Vec<String> = store
            .list_prompts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Terse"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CHATS_FILE), "{not json").unwrap();
        let store = JsonFileStore::new(temp.path());
        assert!(matches!(
            store.load_all().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
