//! The single audio handle owned by the orchestrator.
//!
//! Every clip is assigned a fresh source id. Stopping clears the current
//! source, which ends any `play` still awaiting that source; completions
//! from superseded sources are reported as `Stopped` and change nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::adapters::{AudioSink, PlaybackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The sink played the clip to the end
    Finished,
    /// The source was stopped or replaced first
    Stopped,
}

pub struct PlaybackHandle {
    sink: Arc<dyn AudioSink>,
    next_source: AtomicU64,
    current: watch::Sender<Option<u64>>,
}

impl PlaybackHandle {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            sink,
            next_source: AtomicU64::new(0),
            current,
        }
    }

    /// Allocate a new source id and make it current
    pub fn assign(&self) -> u64 {
        let source = self.next_source.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.send_replace(Some(source));
        source
    }

    pub fn current(&self) -> Option<u64> {
        *self.current.borrow()
    }

    pub fn is_current(&self, source: u64) -> bool {
        self.current() == Some(source)
    }

    /// Stop playback. Returns whether a source was active.
    pub fn stop(&self) -> bool {
        let previous = self.current.send_replace(None);
        if previous.is_some() {
            self.sink.stop();
        }
        previous.is_some()
    }

    /// Play `audio` as `source`, resolving when it ends or is superseded
    pub async fn play(&self, source: u64, audio: Vec<u8>) -> Result<PlaybackEnd, PlaybackError> {
        let mut watcher = self.current.subscribe();
        if *watcher.borrow_and_update() != Some(source) {
            return Ok(PlaybackEnd::Stopped);
        }

        let result = tokio::select! {
            played = self.sink.play(source, audio) => played.map(|_| PlaybackEnd::Finished),
            _ = watcher.wait_for(|current| *current != Some(source)) => Ok(PlaybackEnd::Stopped),
        };

        self.current.send_if_modified(|current| {
            if *current == Some(source) {
                *current = None;
                true
            } else {
                false
            }
        });

        result
    }
}
