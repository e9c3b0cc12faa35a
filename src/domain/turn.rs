//! Turn phases, transient voice state, and turn reconstruction from events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{TurnEvent, TurnEventType};

/// Phase of the voice turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Capturing,
    Transcribing,
    Dispatching,
    Streaming,
    Speaking,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Capturing => "capturing",
            TurnPhase::Transcribing => "transcribing",
            TurnPhase::Dispatching => "dispatching",
            TurnPhase::Streaming => "streaming",
            TurnPhase::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Transient flags for a voice-enabled session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceTurnState {
    pub capturing: bool,
    pub transcribing: bool,
    pub awaiting_completion: bool,
    pub speaking: bool,
    pub speak_locked: bool,
    /// Playback source currently assigned to the audio handle
    pub pending_audio: Option<u64>,
}

impl VoiceTurnState {
    /// Clear everything except an active capture
    pub fn reset(&mut self) {
        let capturing = self.capturing;
        *self = Self::default();
        self.capturing = capturing;
    }

    /// Whether any part of a turn is still in flight
    pub fn is_busy(&self) -> bool {
        self.capturing || self.transcribing || self.awaiting_completion || self.speak_locked
    }
}

/// How a turn ended, as reconstructed from its events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TurnStatus {
    InProgress,
    Completed,
    NoSpeech,
    Interrupted,
    Failed { error: String },
}

/// Summary of one turn rebuilt by replaying its events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: Uuid,
    pub thread_id: String,
    pub status: TurnStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub used_fallback: bool,
    pub fragments: usize,
    pub anomalies: usize,
    pub spoke: bool,
}

impl TurnRecord {
    /// Group a thread's event log into per-turn records, in log order
    pub fn from_log(events: &[TurnEvent]) -> Vec<Self> {
        let mut order: Vec<Uuid> = Vec::new();
        for event in events {
            if !order.contains(&event.turn_id) {
                order.push(event.turn_id);
            }
        }

        order
            .into_iter()
            .filter_map(|turn_id| {
                let turn: Vec<TurnEvent> = events
                    .iter()
                    .filter(|e| e.turn_id == turn_id)
                    .cloned()
                    .collect();
                Self::from_events(&turn)
            })
            .collect()
    }

    /// Reconstruct a single turn from its events
    pub fn from_events(events: &[TurnEvent]) -> Option<Self> {
        let first = events.first()?;

        let mut record = Self {
            turn_id: first.turn_id,
            thread_id: first.thread_id.clone(),
            status: TurnStatus::InProgress,
            started_at: first.timestamp,
            completed_at: None,
            used_fallback: false,
            fragments: 0,
            anomalies: 0,
            spoke: false,
        };

        for event in events {
            record.apply_event(event);
        }

        Some(record)
    }

    pub fn apply_event(&mut self, event: &TurnEvent) {
        match event.event_type {
            TurnEventType::TranscriptionFallback => self.used_fallback = true,
            TurnEventType::FragmentReceived => self.fragments += 1,
            TurnEventType::DecodeAnomaly => self.anomalies += 1,
            TurnEventType::PlaybackStarted => self.spoke = true,
            TurnEventType::TranscriptEmpty => {
                self.status = TurnStatus::NoSpeech;
            }
            TurnEventType::Interrupted => {
                self.status = TurnStatus::Interrupted;
            }
            TurnEventType::CaptureFailed | TurnEventType::DispatchFailed => {
                self.status = TurnStatus::Failed {
                    error: event.error.clone().unwrap_or_default(),
                };
            }
            TurnEventType::TurnCompleted => {
                if self.status == TurnStatus::InProgress {
                    self.status = TurnStatus::Completed;
                }
                self.completed_at = Some(event.timestamp);
            }
            _ => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }
}
