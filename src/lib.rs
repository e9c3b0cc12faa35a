//! parley - voice-turn chat orchestrator
//!
//! Captures speech, transcribes it, streams a chat completion back and
//! speaks the reply, one turn at a time per thread.
//!
//! # Architecture
//!
//! A single orchestrator drives each thread through its turn phases:
//! - Transcription tries a primary vendor under a deadline, then a secondary
//! - Completion bodies are decoded line by line from several wire shapes
//! - Speech goes through one synthesis lock and one playback handle, so a
//!   new capture always interrupts the reply being spoken
//! - Every transition is emitted as a trace event and appended to a
//!   per-thread JSONL turn log
//!
//! # Modules
//!
//! - `adapters`: HTTP vendors (Whisper, Deepgram, ElevenLabs, Hume, chat)
//!   and audio devices
//! - `core`: Gateways, stream decoder, playback handle, orchestrator
//! - `domain`: Data structures (Message, ChatThread, TurnEvent)
//! - `store`: Persisted threads and prompt presets
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Typed turn
//! parley chat "What should I practise today?"
//!
//! # Spoken turn from a recording
//! parley voice question.webm --thread 3f2a
//!
//! # Inspect what happened
//! parley events 3f2a --turns
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod prompts;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{Collaborators, OrchestratorSettings, SpeechOutcome, TurnOutcome, VoiceTurnOrchestrator};
pub use domain::{ChatThread, Message, Role, TurnEvent, TurnEventType, TurnPhase};
pub use store::{ChatSessionStore, JsonFileStore, PromptLibrary};
