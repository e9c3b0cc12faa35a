//! Domain types for parley.
//!
//! - Message / ChatThread: the conversation being built
//! - TurnEvent: immutable trace records of state transitions
//! - TurnPhase / VoiceTurnState: transient voice state
//! - AudioClip / TtsRequest: audio in and out

pub mod audio;
pub mod events;
pub mod message;
pub mod thread;
pub mod turn;

pub use audio::{AudioClip, TtsRequest, TtsVendor};
pub use events::{TurnEvent, TurnEventType};
pub use message::{split_into_chunks, should_split, Message, Role};
pub use thread::{ChatThread, SystemPrompt, DEFAULT_MAX_MESSAGES};
pub use turn::{TurnPhase, TurnRecord, TurnStatus, VoiceTurnState};
