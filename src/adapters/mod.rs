//! Adapter interfaces for external systems.
//!
//! Adapters wrap the vendor endpoints (chat completion, transcription,
//! speech synthesis) and the local audio devices behind traits so the
//! orchestrator can be driven by real HTTP clients, files, or test fakes.

pub mod capture;
pub mod chat;
pub mod deepgram;
pub mod playback;
pub mod tts;
pub mod whisper;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use crate::domain::{AudioClip, TtsVendor};

pub use capture::{AudioCapture, FileCapture};
pub use chat::{ChatClient, ChatRequest, WireMessage};
pub use deepgram::DeepgramTranscriber;
pub use playback::{AudioSink, FileSink, NullSink};
pub use tts::HttpSynthesizer;
pub use whisper::{is_fallback_marker, WhisperTranscriber};

/// Raw response body chunks from the completion endpoint
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, DispatchError>> + Send>>;

/// Output of a transcription vendor
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub duration_seconds: Option<f64>,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration_seconds: None,
        }
    }
}

/// Speech-to-text vendor
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Human-readable vendor name
    fn name(&self) -> &str;

    async fn transcribe(&self, clip: &AudioClip) -> Result<Transcript, TranscriptionError>;
}

/// Text-to-speech vendor
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn vendor(&self) -> TtsVendor;

    /// Returns encoded audio (mp3)
    async fn synthesize(&self, text: &str, voice_id: Option<&str>)
        -> Result<Vec<u8>, SynthesisError>;
}

/// Streaming chat completion endpoint
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Send the request and return the body once the response status is known
    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream, DispatchError>;
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The selected model cannot perform the requested operation; the
    /// secondary vendor is expected to handle the clip.
    #[error("operation not supported by transcription model: {0}")]
    Unsupported(String),

    #[error("transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("transcription endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("invalid transcription response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// 422 with a machine-readable detail
    #[error("{vendor} rejected the request: {detail}")]
    Validation { vendor: TtsVendor, detail: String },

    #[error("{vendor} returned {status}: {body}")]
    Status {
        vendor: TtsVendor,
        status: u16,
        body: String,
    },

    #[error("{vendor} request failed: {message}")]
    Request { vendor: TtsVendor, message: String },

    #[error("{0} returned no audio")]
    EmptyAudio(TtsVendor),

    #[error("no synthesizer configured for {0}")]
    NotConfigured(TtsVendor),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("completion stream broke: {0}")]
    Body(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone unavailable: {0}")]
    Unavailable(String),

    #[error("a capture is already active")]
    AlreadyActive,

    #[error("no capture is active")]
    NotActive,

    #[error("a turn is still being processed")]
    TurnInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio could not be played: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
