//! Append-only turn log with file-based persistence.
//!
//! One JSONL file per thread under `$PARLEY_HOME/turns/`, so a thread's
//! history can be inspected with `parley events <thread>` or plain `jq`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::observer::TurnObserver;
use crate::domain::{TurnEvent, TurnEventType, TurnRecord};

/// File-based event log using JSONL format
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Directory holding one `<thread>.jsonl` per thread
    dir: PathBuf,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log rooted at the configured turns directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::config::turns_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to a thread's events file
    pub fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", file_stem(thread_id)))
    }

    /// Append an event to its thread's log
    pub async fn append(&self, event: &TurnEvent) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create turns directory: {}", self.dir.display()))?;

        let path = self.path_for(&event.thread_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open events file: {}", path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events of a thread in order
    pub async fn replay(&self, thread_id: &str) -> Result<Vec<TurnEvent>> {
        let path = self.path_for(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)
            .await
            .with_context(|| format!("Failed to open events file: {}", path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: TurnEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Per-turn summaries rebuilt from the log
    pub async fn turns(&self, thread_id: &str) -> Result<Vec<TurnRecord>> {
        Ok(TurnRecord::from_log(&self.replay(thread_id).await?))
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(
        &self,
        thread_id: &str,
        event_type: TurnEventType,
    ) -> Result<Option<TurnEvent>> {
        let events = self.replay(thread_id).await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }

    /// Delete a thread's log. Missing logs are not an error.
    pub async fn remove(&self, thread_id: &str) -> Result<()> {
        let path = self.path_for(thread_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[async_trait]
impl TurnObserver for EventLog {
    async fn record(&self, event: &TurnEvent) {
        if let Err(e) = self.append(event).await {
            tracing::warn!(error = %e, thread = %event.thread_id, "Failed to append turn event");
        }
    }
}

/// Thread ids become file names; anything outside `[A-Za-z0-9_-]` is replaced
fn file_stem(thread_id: &str) -> String {
    thread_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
