//! Core orchestration logic.
//!
//! This module contains:
//! - Decoder: chunked completion body to text fragments
//! - Sanitize: per-vendor cleanup of text before synthesis
//! - Transcription / Synthesis: vendor gateways with fallback and retry
//! - Playback: the single audio handle
//! - Observer / EventLog: where turn events go
//! - Orchestrator: the voice turn state machine

pub mod decoder;
pub mod event_log;
pub mod observer;
pub mod orchestrator;
pub mod playback;
pub mod sanitize;
pub mod synthesis;
pub mod transcription;

// Re-export commonly used types
pub use decoder::{decode_line, fragments, Decoded, LineOutcome, StreamDecoder, WireShape, DONE_SENTINEL};
pub use event_log::EventLog;
pub use observer::{Observers, RecordingObserver, TracingObserver, TurnObserver};
pub use orchestrator::{
    Collaborators, OrchestratorSettings, SpeechOutcome, TurnOutcome, VoiceTurnOrchestrator,
};
pub use playback::{PlaybackEnd, PlaybackHandle};
pub use sanitize::{sanitize_for_vendor, strip_markup, CueMode};
pub use synthesis::{SpeechSynthesisGateway, SynthesisOutput};
pub use transcription::{TranscriptionGateway, TranscriptionOutcome};
