//! Transcription with a bounded primary attempt and a single fallback.
//!
//! The primary vendor gets one try under a timeout. Any failure (including the
//! expected "translation unsupported" rejection) hands the clip to the
//! secondary vendor exactly once. The gateway never fails: when both vendors
//! come back empty-handed the transcript is the empty string.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::adapters::{Transcriber, TranscriptionError};
use crate::domain::AudioClip;

/// Default bound on the primary attempt
pub const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_secs(7);

/// What happened while transcribing one clip
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutcome {
    /// Trimmed transcript, empty when nothing was recognised
    pub text: String,
    /// Name of the vendor that produced `text` (None when both failed)
    pub vendor: Option<String>,
    /// Why the primary attempt was abandoned, if it was
    pub primary_error: Option<String>,
    pub secondary_error: Option<String>,
    pub duration_ms: u64,
}

impl TranscriptionOutcome {
    pub fn used_fallback(&self) -> bool {
        self.primary_error.is_some()
    }
}

pub struct TranscriptionGateway {
    primary: Arc<dyn Transcriber>,
    secondary: Arc<dyn Transcriber>,
    timeout: Duration,
    last_transcript: Mutex<String>,
}

impl TranscriptionGateway {
    pub fn new(primary: Arc<dyn Transcriber>, secondary: Arc<dyn Transcriber>) -> Self {
        Self {
            primary,
            secondary,
            timeout: DEFAULT_PRIMARY_TIMEOUT,
            last_transcript: Mutex::new(String::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Transcribe a clip, returning the empty string on total failure
    pub async fn transcribe(&self, clip: &AudioClip) -> String {
        self.transcribe_detailed(clip).await.text
    }

    pub async fn transcribe_detailed(&self, clip: &AudioClip) -> TranscriptionOutcome {
        let started = Instant::now();
        let fingerprint = clip.fingerprint();

        let primary_error = match self.attempt_primary(clip).await {
            Ok(text) => {
                debug!(clip = %fingerprint, vendor = self.primary.name(), "Primary transcription succeeded");
                return self.finish(TranscriptionOutcome {
                    text,
                    vendor: Some(self.primary.name().to_string()),
                    primary_error: None,
                    secondary_error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(e) => e,
        };

        match &primary_error {
            TranscriptionError::Unsupported(_) => {
                info!(clip = %fingerprint, "Primary model cannot handle clip, using fallback")
            }
            other => warn!(clip = %fingerprint, error = %other, "Primary transcription failed"),
        }

        let outcome = match self.secondary.transcribe(clip).await {
            Ok(transcript) => TranscriptionOutcome {
                text: transcript.text.trim().to_string(),
                vendor: Some(self.secondary.name().to_string()),
                primary_error: Some(primary_error.to_string()),
                secondary_error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => {
                warn!(clip = %fingerprint, error = %e, "Fallback transcription failed");
                TranscriptionOutcome {
                    text: String::new(),
                    vendor: None,
                    primary_error: Some(primary_error.to_string()),
                    secondary_error: Some(e.to_string()),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
        };

        self.finish(outcome)
    }

    async fn attempt_primary(&self, clip: &AudioClip) -> Result<String, TranscriptionError> {
        let transcript = tokio::time::timeout(self.timeout, self.primary.transcribe(clip))
            .await
            .map_err(|_| TranscriptionError::Timeout(self.timeout))??;
        Ok(transcript.text.trim().to_string())
    }

    fn finish(&self, outcome: TranscriptionOutcome) -> TranscriptionOutcome {
        *self.last_transcript.lock() = outcome.text.clone();
        outcome
    }

    /// Most recent transcript produced by this gateway
    pub fn transcript(&self) -> String {
        self.last_transcript.lock().clone()
    }

    pub fn clear_transcript(&self) {
        self.last_transcript.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Transcript;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Text(&'static str),
        Unsupported,
        Status(u16),
        Hang,
    }

    struct Scripted {
        name: &'static str,
        script: Script,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                name,
                script,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transcriber for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn transcribe(&self, _clip: &AudioClip) -> Result<Transcript, TranscriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Text(text) => Ok(Transcript::new(text)),
                Script::Unsupported => Err(TranscriptionError::Unsupported("translation".into())),
                Script::Status(status) => Err(TranscriptionError::Status {
                    status,
                    body: String::new(),
                }),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Transcript::new("too late"))
                }
            }
        }
    }

    fn clip() -> AudioClip {
        AudioClip::webm(vec![1, 2, 3, 4])
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = Scripted::new("whisper", Script::Text("  Hello there "));
        let secondary = Scripted::new("deepgram", Script::Text("unused"));
        let gateway = TranscriptionGateway::new(primary.clone(), secondary.clone());

        let outcome = gateway.transcribe_detailed(&clip()).await;
        assert_eq!(outcome.text, "Hello there");
        assert!(!outcome.used_fallback());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(gateway.transcript(), "Hello there");
    }

    #[tokio::test]
    async fn test_unsupported_falls_back_once() {
        let primary = Scripted::new("whisper", Script::Unsupported);
        let secondary = Scripted::new("deepgram", Script::Text("Hola"));
        let gateway = TranscriptionGateway::new(primary.clone(), secondary.clone());

        let outcome = gateway.transcribe_detailed(&clip()).await;
        assert_eq!(outcome.text, "Hola");
        assert_eq!(outcome.vendor.as_deref(), Some("deepgram"));
        assert!(outcome.used_fallback());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_failing_yields_empty() {
        let primary = Scripted::new("whisper", Script::Status(500));
        let secondary = Scripted::new("deepgram", Script::Status(502));
        let gateway = TranscriptionGateway::new(primary.clone(), secondary.clone());

        assert_eq!(gateway.transcribe(&clip()).await, "");
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_hands_over_to_secondary() {
        let primary = Scripted::new("whisper", Script::Hang);
        let secondary = Scripted::new("deepgram", Script::Text(""));
        let gateway = TranscriptionGateway::new(primary.clone(), secondary.clone())
            .with_timeout(Duration::from_millis(50));

        let outcome = gateway.transcribe_detailed(&clip()).await;
        assert_eq!(outcome.text, "");
        assert!(outcome
            .primary_error
            .as_deref()
            .is_some_and(|e| e.contains("timed out")));
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_transcript() {
        let gateway = TranscriptionGateway::new(
            Scripted::new("whisper", Script::Text("hi")),
            Scripted::new("deepgram", Script::Text("")),
        );
        gateway.transcribe(&clip()).await;
        gateway.clear_transcript();
        assert_eq!(gateway.transcript(), "");
    }
}
