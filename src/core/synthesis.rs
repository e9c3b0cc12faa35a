//! Speech synthesis with per-vendor sanitizing and a size-based quality retry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::sanitize::{sanitize_for_vendor, strip_markup, CueMode};
use crate::adapters::{SynthesisError, Synthesizer};
use crate::domain::{TtsRequest, TtsVendor};

/// ElevenLabs responses below this size are usually truncated SSML reads
pub const DEFAULT_MIN_AUDIO_BYTES: usize = 10_240;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutput {
    pub audio: Vec<u8>,
    pub vendor: TtsVendor,
    /// Whether the plain-text quality retry ran
    pub retried: bool,
}

pub struct SpeechSynthesisGateway {
    synthesizers: HashMap<TtsVendor, Arc<dyn Synthesizer>>,
    min_audio_bytes: usize,
    cue_mode: CueMode,
}

impl Default for SpeechSynthesisGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesisGateway {
    pub fn new() -> Self {
        Self {
            synthesizers: HashMap::new(),
            min_audio_bytes: DEFAULT_MIN_AUDIO_BYTES,
            cue_mode: CueMode::default(),
        }
    }

    /// Register a vendor client, replacing any previous one for that vendor
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizers.insert(synthesizer.vendor(), synthesizer);
        self
    }

    pub fn with_min_audio_bytes(mut self, min_audio_bytes: usize) -> Self {
        self.min_audio_bytes = min_audio_bytes;
        self
    }

    pub fn with_cue_mode(mut self, cue_mode: CueMode) -> Self {
        self.cue_mode = cue_mode;
        self
    }

    /// Sanitized text as it will be sent to `vendor`
    pub fn prepare(&self, text: &str, vendor: TtsVendor) -> String {
        sanitize_for_vendor(text, vendor, self.cue_mode)
    }

    pub async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, SynthesisError> {
        Ok(self.synthesize_detailed(request).await?.audio)
    }

    pub async fn synthesize_detailed(
        &self,
        request: &TtsRequest,
    ) -> Result<SynthesisOutput, SynthesisError> {
        let vendor = request.vendor;
        let synthesizer = self
            .synthesizers
            .get(&vendor)
            .ok_or(SynthesisError::NotConfigured(vendor))?;
        let voice_id = request.voice_id.as_deref();

        let text = self.prepare(&request.text, vendor);
        let audio = match synthesizer.synthesize(&text, voice_id).await {
            // An empty body is the smallest possible read; let the retry decide
            Err(SynthesisError::EmptyAudio(_)) if vendor == TtsVendor::ElevenLabs => Vec::new(),
            other => other?,
        };
        debug!(%vendor, bytes = audio.len(), "Synthesis complete");

        if vendor != TtsVendor::ElevenLabs || audio.len() >= self.min_audio_bytes {
            return Ok(SynthesisOutput {
                audio,
                vendor,
                retried: false,
            });
        }

        warn!(
            bytes = audio.len(),
            threshold = self.min_audio_bytes,
            "Audio suspiciously small, retrying without markup"
        );

        let plain = strip_markup(&request.text);
        let audio = match synthesizer.synthesize(&plain, voice_id).await {
            Ok(retry) if retry.len() > audio.len() => retry,
            Ok(_) => audio,
            Err(e) => {
                warn!(error = %e, "Plain-text retry failed, keeping first result");
                audio
            }
        };
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio(vendor));
        }

        Ok(SynthesisOutput {
            audio,
            vendor,
            retried: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Returns scripted sizes in order and records the text it was given
    struct Recording {
        vendor: TtsVendor,
        sizes: Mutex<Vec<Result<usize, u16>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(vendor: TtsVendor, sizes: Vec<Result<usize, u16>>) -> Arc<Self> {
            Arc::new(Self {
                vendor,
                sizes: Mutex::new(sizes),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    #[async_trait]
    impl Synthesizer for Recording {
        fn vendor(&self) -> TtsVendor {
            self.vendor
        }

        async fn synthesize(
            &self,
            text: &str,
            _voice_id: Option<&str>,
        ) -> Result<Vec<u8>, SynthesisError> {
            self.seen.lock().push(text.to_string());
            match self.sizes.lock().remove(0) {
                Ok(0) => Err(SynthesisError::EmptyAudio(self.vendor)),
                Ok(size) => Ok(vec![0u8; size]),
                Err(status) => Err(SynthesisError::Status {
                    vendor: self.vendor,
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_large_audio_is_not_retried() {
        let eleven = Recording::new(TtsVendor::ElevenLabs, vec![Ok(20_000)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(eleven.clone());

        let out = gateway
            .synthesize_detailed(&TtsRequest::new("[laughs] Hi", TtsVendor::ElevenLabs))
            .await
            .unwrap();
        assert!(!out.retried);
        assert_eq!(eleven.seen(), vec!["<speak>Hi</speak>"]);
    }

    #[tokio::test]
    async fn test_small_audio_retries_plain_and_keeps_larger() {
        let eleven = Recording::new(TtsVendor::ElevenLabs, vec![Ok(4_000), Ok(12_000)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(eleven.clone());

        let request = TtsRequest::new(r#"<speak>One <break time="1s"/> two</speak>"#, TtsVendor::ElevenLabs);
        let out = gateway.synthesize_detailed(&request).await.unwrap();

        assert!(out.retried);
        assert_eq!(out.audio.len(), 12_000);
        assert_eq!(eleven.seen()[1], "One two");
    }

    #[tokio::test]
    async fn test_failed_retry_keeps_first() {
        let eleven = Recording::new(TtsVendor::ElevenLabs, vec![Ok(4_000), Err(500)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(eleven);

        let audio = gateway
            .synthesize(&TtsRequest::new("short", TtsVendor::ElevenLabs))
            .await
            .unwrap();
        assert_eq!(audio.len(), 4_000);
    }

    #[tokio::test]
    async fn test_empty_first_read_is_retried() {
        let eleven = Recording::new(TtsVendor::ElevenLabs, vec![Ok(0), Ok(15_000)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(eleven.clone());

        let out = gateway
            .synthesize_detailed(&TtsRequest::new("[sighs] <speak>Fine.</speak>", TtsVendor::ElevenLabs))
            .await
            .unwrap();
        assert!(out.retried);
        assert_eq!(out.audio.len(), 15_000);
        assert_eq!(eleven.seen(), vec!["<speak>Fine.</speak>", "Fine."]);
    }

    #[tokio::test]
    async fn test_empty_after_retry_is_an_error() {
        let eleven = Recording::new(TtsVendor::ElevenLabs, vec![Ok(0), Ok(0)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(eleven.clone());

        let err = gateway
            .synthesize(&TtsRequest::new("Hi", TtsVendor::ElevenLabs))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyAudio(TtsVendor::ElevenLabs)));
        assert_eq!(eleven.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_hume_read_is_not_retried() {
        let hume = Recording::new(TtsVendor::Hume, vec![Ok(0)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(hume.clone());

        let err = gateway
            .synthesize(&TtsRequest::new("Hi", TtsVendor::Hume))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyAudio(TtsVendor::Hume)));
        assert_eq!(hume.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_hume_gets_plain_text_without_retry() {
        let hume = Recording::new(TtsVendor::Hume, vec![Ok(100)]);
        let gateway = SpeechSynthesisGateway::new().with_synthesizer(hume.clone());

        let out = gateway
            .synthesize_detailed(&TtsRequest::new("<speak>[sighs] Fine.</speak>", TtsVendor::Hume))
            .await
            .unwrap();
        assert!(!out.retried);
        assert_eq!(hume.seen(), vec!["Fine."]);
    }

    #[tokio::test]
    async fn test_missing_vendor() {
        let gateway = SpeechSynthesisGateway::new();
        let err = gateway
            .synthesize(&TtsRequest::new("hi", TtsVendor::Hume))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::NotConfigured(TtsVendor::Hume)));
    }
}
