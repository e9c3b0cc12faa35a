//! Microphone capture.
//!
//! A capture is started, then stopped to yield the recorded clip. The
//! terminal build has no microphone, so `FileCapture` replays a recording
//! from disk in its place.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::CaptureError;
use crate::domain::AudioClip;

#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Begin recording. Fails if the device is unavailable or already recording.
    async fn start(&self) -> Result<(), CaptureError>;

    /// Stop recording and return what was captured
    async fn stop(&self) -> Result<AudioClip, CaptureError>;

    fn is_active(&self) -> bool;
}

/// Reads a pre-recorded audio file when the capture stops
pub struct FileCapture {
    path: PathBuf,
    active: AtomicBool,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AudioCapture for FileCapture {
    async fn start(&self) -> Result<(), CaptureError> {
        if !self.path.is_file() {
            return Err(CaptureError::Unavailable(format!(
                "no recording at {}",
                self.path.display()
            )));
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyActive);
        }
        tracing::debug!(path = %self.path.display(), "Capture started");
        Ok(())
    }

    async fn stop(&self) -> Result<AudioClip, CaptureError> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Err(CaptureError::NotActive);
        }
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(AudioClip::from_path(&self.path, bytes))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
