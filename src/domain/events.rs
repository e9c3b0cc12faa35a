//! Trace events emitted by the voice turn orchestrator.
//!
//! Every state transition produces one immutable event. Observers decide what
//! to do with them (log, persist as JSONL, collect in tests).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::turn::TurnPhase;

/// A single record in a thread's turn log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The turn this event belongs to
    pub turn_id: Uuid,

    /// Thread the turn runs against
    pub thread_id: String,

    /// Type of event
    pub event_type: TurnEventType,

    /// Orchestrator phase after this event
    pub phase: TurnPhase,

    /// Human-readable summary (no transcript or audio content)
    pub summary: String,

    /// Decoded text, only set on `FragmentReceived`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,

    /// Time taken in milliseconds (for completed operations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error message if something failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        turn_id: Uuid,
        thread_id: impl Into<String>,
        event_type: TurnEventType,
        phase: TurnPhase,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            turn_id,
            thread_id: thread_id.into(),
            event_type,
            phase,
            summary: summary.into(),
            fragment: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Whether this event reports a recovered failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self.event_type,
            TurnEventType::CaptureFailed
                | TurnEventType::DispatchFailed
                | TurnEventType::SynthesisFailed
                | TurnEventType::PlaybackFailed
                | TurnEventType::PersistFailed
        )
    }
}

/// Types of events that can occur during a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEventType {
    /// Microphone capture began
    CaptureStarted,

    /// Microphone unavailable or denied
    CaptureFailed,

    /// Playback was stopped by a new capture or an explicit stop
    Interrupted,

    /// Clip handed to the transcription gateway
    TranscriptionStarted,

    /// Primary vendor failed or timed out, secondary attempted
    TranscriptionFallback,

    /// A non-empty transcript was produced
    TranscriptionCompleted,

    /// Both vendors produced nothing; the turn ends silently
    TranscriptEmpty,

    /// User message appended and chat request sent
    DispatchStarted,

    /// Completion endpoint returned non-2xx or the connection failed
    DispatchFailed,

    /// Response body started streaming
    StreamOpened,

    /// A decoded fragment was applied to the assistant message
    FragmentReceived,

    /// A line matched no known wire shape and was dropped
    DecodeAnomaly,

    /// Response body ended or hit the sentinel
    StreamCompleted,

    /// Synthesis request issued
    SynthesisStarted,

    /// Audio was implausibly small, retried without markup
    SynthesisRetried,

    /// Synthesis vendor failed
    SynthesisFailed,

    /// Speak-lock was held; request dropped
    SynthesisDropped,

    /// Synthesis finished after an interruption; audio discarded
    SynthesisDiscarded,

    /// Audio assigned to the playback handle
    PlaybackStarted,

    /// Playback ran to completion
    PlaybackEnded,

    /// Playback errored
    PlaybackFailed,

    /// Thread written to the session store
    ThreadSaved,

    /// Session store write failed
    PersistFailed,

    /// Turn returned to idle
    TurnCompleted,
}
