//! Audio output.
//!
//! `play` resolves once playback has ended or been stopped. Each call carries
//! the source id assigned by the playback handle so a sink can tell overlapping
//! requests apart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::PlaybackError;

#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, source: u64, audio: Vec<u8>) -> Result<(), PlaybackError>;

    /// Stop whatever is playing; a pending `play` resolves promptly
    fn stop(&self);
}

/// Writes each clip to `<dir>/source-<n>.mp3`
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: u64) -> PathBuf {
        self.dir.join(format!("source-{}.mp3", source))
    }
}

#[async_trait]
impl AudioSink for FileSink {
    async fn play(&self, source: u64, audio: Vec<u8>) -> Result<(), PlaybackError> {
        if audio.is_empty() {
            return Err(PlaybackError::Device("empty audio".to_string()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(source);
        tokio::fs::write(&path, &audio).await?;
        tracing::info!(path = %path.display(), bytes = audio.len(), "Audio written");
        Ok(())
    }

    fn stop(&self) {}
}

/// Discards audio
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _source: u64, _audio: Vec<u8>) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&self) {}
}
