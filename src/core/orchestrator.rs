//! Voice turn orchestrator.
//!
//! Drives one thread through capture, transcription, chat dispatch, stream
//! consumption and speech, emitting a trace event at every transition.
//!
//! The handle is cheap to clone. Session state lives behind a mutex that is
//! never held across an `.await`, so one task can interrupt another task's
//! turn (a new capture while the reply is still being spoken).

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AudioCapture, AudioSink, ByteStream, CaptureError, ChatEndpoint, ChatRequest};
use crate::config::ResolvedConfig;
use crate::domain::{
    ChatThread, Message, TtsRequest, TtsVendor, TurnEvent, TurnEventType, TurnPhase,
    VoiceTurnState, DEFAULT_MAX_MESSAGES,
};
use crate::prompts::DEFAULT_VOICE_PROMPT;
use crate::store::ChatSessionStore;

use super::decoder::{Decoded, StreamDecoder};
use super::observer::TurnObserver;
use super::playback::{PlaybackEnd, PlaybackHandle};
use super::synthesis::SpeechSynthesisGateway;
use super::transcription::TranscriptionGateway;

/// Longest decode-anomaly excerpt kept in an event
const ANOMALY_EXCERPT_CHARS: usize = 200;

/// Tunables that may change between turns
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Speak completed replies
    pub voice_output: bool,
    /// System prompt for spoken turns; typed turns use the thread's prompt
    pub voice_prompt: String,
    pub max_messages: usize,
    pub vendor: TtsVendor,
    pub voice_id: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            voice_output: true,
            voice_prompt: DEFAULT_VOICE_PROMPT.to_string(),
            max_messages: DEFAULT_MAX_MESSAGES,
            vendor: TtsVendor::default(),
            voice_id: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            voice_output: config.conversation.voice_output,
            voice_prompt: config.conversation.voice_prompt.clone(),
            max_messages: config.conversation.max_messages,
            vendor: config.synthesis.vendor,
            voice_id: config.synthesis.voice_id.clone(),
        }
    }
}

/// Everything the orchestrator talks to
pub struct Collaborators {
    pub capture: Arc<dyn AudioCapture>,
    pub transcription: TranscriptionGateway,
    pub chat: Arc<dyn ChatEndpoint>,
    pub synthesis: SpeechSynthesisGateway,
    pub sink: Arc<dyn AudioSink>,
    pub store: Arc<dyn ChatSessionStore>,
    pub observer: Arc<dyn TurnObserver>,
}

/// How a speak request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Audio played to the end
    Played,
    /// Another synthesis held the speak-lock; request dropped
    Locked,
    /// This message was already spoken
    AlreadySpoken,
    /// Interrupted while synthesizing; audio thrown away
    Discarded,
    /// Interrupted while playing
    Stopped,
    SynthesisFailed { error: String },
    PlaybackFailed { error: String },
}

/// Result of a typed or spoken turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        message_id: Uuid,
        content: String,
        /// None when voice output is off or the reply was empty
        speech: Option<SpeechOutcome>,
    },
    /// Nothing was said or typed
    NoInput,
    /// Another turn is still capturing, transcribing or streaming
    Busy,
    CaptureFailed {
        error: String,
    },
    /// The partial reply, if any, is kept in the thread
    DispatchFailed {
        error: String,
        partial: String,
    },
}

struct Session {
    thread: ChatThread,
    voice: VoiceTurnState,
    phase: TurnPhase,
    turn_id: Option<Uuid>,
    /// Bumped by every interruption; synthesis results carry the value they
    /// started with and are discarded on mismatch
    generation: u64,
    last_spoken_id: Option<Uuid>,
}

impl Session {
    /// Drop the speak-lock and forget the playing source
    fn release_speech(&mut self) {
        self.generation += 1;
        self.voice.speaking = false;
        self.voice.speak_locked = false;
        self.voice.pending_audio = None;
    }
}

struct Inner {
    capture: Arc<dyn AudioCapture>,
    transcription: TranscriptionGateway,
    chat: Arc<dyn ChatEndpoint>,
    synthesis: SpeechSynthesisGateway,
    playback: PlaybackHandle,
    store: Arc<dyn ChatSessionStore>,
    observer: Arc<dyn TurnObserver>,
    settings: Mutex<OrchestratorSettings>,
    session: Mutex<Session>,
}

#[derive(Clone)]
pub struct VoiceTurnOrchestrator {
    inner: Arc<Inner>,
}

impl VoiceTurnOrchestrator {
    pub fn new(thread: ChatThread, parts: Collaborators, settings: OrchestratorSettings) -> Self {
        let session = Session {
            thread,
            voice: VoiceTurnState::default(),
            phase: TurnPhase::Idle,
            turn_id: None,
            generation: 0,
            last_spoken_id: None,
        };

        Self {
            inner: Arc::new(Inner {
                capture: parts.capture,
                transcription: parts.transcription,
                chat: parts.chat,
                synthesis: parts.synthesis,
                playback: PlaybackHandle::new(parts.sink),
                store: parts.store,
                observer: parts.observer,
                settings: Mutex::new(settings),
                session: Mutex::new(session),
            }),
        }
    }

    /// Snapshot of the thread
    pub fn thread(&self) -> ChatThread {
        self.inner.session.lock().thread.clone()
    }

    pub fn thread_id(&self) -> String {
        self.inner.session.lock().thread.id.clone()
    }

    pub fn state(&self) -> VoiceTurnState {
        self.inner.session.lock().voice.clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.inner.session.lock().phase
    }

    pub fn is_speaking(&self) -> bool {
        self.inner.session.lock().voice.speaking
    }

    /// Last transcript produced for this session
    pub fn transcript(&self) -> String {
        self.inner.transcription.transcript()
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.inner.settings.lock().clone()
    }

    pub fn set_voice_output(&self, enabled: bool) {
        self.inner.settings.lock().voice_output = enabled;
    }

    pub fn set_vendor(&self, vendor: TtsVendor) {
        self.inner.settings.lock().vendor = vendor;
    }

    /// Start recording. Interrupts any speech in progress first.
    #[instrument(skip(self), fields(thread = %self.thread_id()))]
    pub async fn start_capture(&self) -> Result<(), CaptureError> {
        let (turn_id, interrupted) = {
            let mut s = self.inner.session.lock();
            if s.voice.capturing {
                return Err(CaptureError::AlreadyActive);
            }
            if s.voice.transcribing || s.voice.awaiting_completion {
                return Err(CaptureError::TurnInProgress);
            }

            let was_speaking = s.voice.speaking || s.voice.speak_locked;
            let previous_turn = s.turn_id;
            if was_speaking {
                s.release_speech();
            }
            s.voice.reset();
            s.voice.capturing = true;
            s.phase = TurnPhase::Capturing;

            let turn_id = Uuid::new_v4();
            s.turn_id = Some(turn_id);
            (turn_id, was_speaking.then(|| previous_turn.unwrap_or(turn_id)))
        };

        if let Some(previous) = interrupted {
            self.inner.playback.stop();
            info!(%previous, "Interrupted speech for new capture");
            self.emit(self.event(
                previous,
                TurnEventType::Interrupted,
                "Speech interrupted by new capture",
            ))
            .await;
        }

        self.inner.transcription.clear_transcript();
        match self.inner.capture.start().await {
            Ok(()) => {
                self.emit(self.event(turn_id, TurnEventType::CaptureStarted, "Capture started"))
                    .await;
                Ok(())
            }
            Err(e) => {
                {
                    let mut s = self.inner.session.lock();
                    s.voice.capturing = false;
                    s.phase = TurnPhase::Idle;
                }
                error!(error = %e, "Capture failed to start");
                self.emit(
                    self.event(turn_id, TurnEventType::CaptureFailed, "Capture failed to start")
                        .with_error(e.to_string()),
                )
                .await;
                self.emit(self.event(turn_id, TurnEventType::TurnCompleted, "Turn ended without input"))
                    .await;
                Err(e)
            }
        }
    }

    /// Stop recording and run the rest of the turn
    #[instrument(skip(self), fields(thread = %self.thread_id()))]
    pub async fn finish_capture(&self) -> TurnOutcome {
        let turn_id = {
            let s = self.inner.session.lock();
            if !s.voice.capturing {
                return TurnOutcome::CaptureFailed {
                    error: CaptureError::NotActive.to_string(),
                };
            }
            s.turn_id.unwrap_or_else(Uuid::new_v4)
        };

        let clip = self.inner.capture.stop().await;
        {
            let mut s = self.inner.session.lock();
            s.voice.capturing = false;
            match &clip {
                Ok(clip) if !clip.is_empty() => {
                    s.voice.transcribing = true;
                    s.phase = TurnPhase::Transcribing;
                }
                _ => s.phase = TurnPhase::Idle,
            }
        }

        let clip = match clip {
            Ok(clip) => clip,
            Err(e) => {
                error!(error = %e, "Capture failed");
                self.emit(
                    self.event(turn_id, TurnEventType::CaptureFailed, "Capture failed")
                        .with_error(e.to_string()),
                )
                .await;
                self.emit(self.event(turn_id, TurnEventType::TurnCompleted, "Turn ended without input"))
                    .await;
                return TurnOutcome::CaptureFailed {
                    error: e.to_string(),
                };
            }
        };

        if clip.is_empty() {
            self.emit(self.event(turn_id, TurnEventType::TranscriptEmpty, "Recording was empty"))
                .await;
            self.emit(self.event(turn_id, TurnEventType::TurnCompleted, "Turn ended without input"))
                .await;
            return TurnOutcome::NoInput;
        }

        self.emit(self.event(
            turn_id,
            TurnEventType::TranscriptionStarted,
            format!("Transcribing {} bytes (clip {})", clip.bytes.len(), clip.fingerprint()),
        ))
        .await;

        let outcome = self.inner.transcription.transcribe_detailed(&clip).await;
        if let Some(primary_error) = &outcome.primary_error {
            self.emit(
                self.event(
                    turn_id,
                    TurnEventType::TranscriptionFallback,
                    "Primary transcription failed, using fallback",
                )
                .with_error(primary_error.clone()),
            )
            .await;
        }

        let text = outcome.text.clone();
        {
            let mut s = self.inner.session.lock();
            s.voice.transcribing = false;
            if text.is_empty() {
                s.phase = TurnPhase::Idle;
            } else {
                s.voice.awaiting_completion = true;
            }
        }

        if text.is_empty() {
            let mut event = self
                .event(turn_id, TurnEventType::TranscriptEmpty, "No speech recognised")
                .with_duration(outcome.duration_ms);
            if let Some(e) = outcome.secondary_error {
                event = event.with_error(e);
            }
            self.emit(event).await;
            self.emit(self.event(turn_id, TurnEventType::TurnCompleted, "Turn ended without input"))
                .await;
            return TurnOutcome::NoInput;
        }

        self.emit(
            self.event(
                turn_id,
                TurnEventType::TranscriptionCompleted,
                format!(
                    "Transcribed {} chars via {}",
                    text.chars().count(),
                    outcome.vendor.as_deref().unwrap_or("unknown")
                ),
            )
            .with_duration(outcome.duration_ms),
        )
        .await;

        let voice_prompt = self.inner.settings.lock().voice_prompt.clone();
        self.dispatch(turn_id, text, voice_prompt).await
    }

    /// Run a typed turn through the same dispatch, stream and speak path
    #[instrument(skip(self, text), fields(thread = %self.thread_id()))]
    pub async fn send_text(&self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::NoInput;
        }

        let (turn_id, prompt) = {
            let mut s = self.inner.session.lock();
            if s.voice.capturing || s.voice.transcribing || s.voice.awaiting_completion {
                return TurnOutcome::Busy;
            }
            s.voice.awaiting_completion = true;
            let turn_id = Uuid::new_v4();
            s.turn_id = Some(turn_id);
            (turn_id, s.thread.system_prompt.clone())
        };

        self.dispatch(turn_id, text.to_string(), prompt).await
    }

    /// Speak arbitrary text. Dropped if a synthesis is already in flight.
    pub async fn speak(&self, text: &str) -> SpeechOutcome {
        let turn_id = *self
            .inner
            .session
            .lock()
            .turn_id
            .get_or_insert_with(Uuid::new_v4);
        self.speak_turn(turn_id, None, text).await
    }

    /// Stop speech without starting a capture. Returns whether anything stopped.
    pub async fn stop_speaking(&self) -> bool {
        let interrupted = {
            let mut s = self.inner.session.lock();
            if !(s.voice.speaking || s.voice.speak_locked) {
                return false;
            }
            s.release_speech();
            s.phase = TurnPhase::Idle;
            s.turn_id.unwrap_or_else(Uuid::new_v4)
        };

        self.inner.playback.stop();
        self.emit(self.event(interrupted, TurnEventType::Interrupted, "Speech stopped"))
            .await;
        true
    }

    async fn dispatch(&self, turn_id: Uuid, text: String, system_prompt: String) -> TurnOutcome {
        let max_messages = self.inner.settings.lock().max_messages;

        let request = {
            let mut s = self.inner.session.lock();
            s.phase = TurnPhase::Dispatching;
            s.thread.push(Message::user(text));
            ChatRequest::new(&s.thread.messages).with_system_prompt(system_prompt)
        };

        self.emit(self.event(
            turn_id,
            TurnEventType::DispatchStarted,
            format!("Dispatching {} messages", request.messages.len()),
        ))
        .await;

        let started = Instant::now();
        let body = match self.inner.chat.stream(&request).await {
            Ok(body) => body,
            Err(e) => {
                return self
                    .fail_dispatch(turn_id, None, e.to_string(), max_messages)
                    .await
            }
        };

        let assistant_id = {
            let mut s = self.inner.session.lock();
            let placeholder = Message::assistant_placeholder();
            let id = placeholder.id;
            s.thread.push(placeholder);
            s.phase = TurnPhase::Streaming;
            id
        };
        self.emit(self.event(turn_id, TurnEventType::StreamOpened, "Response stream opened"))
            .await;

        let (fragments, anomalies, failure) = self.consume(turn_id, assistant_id, body).await;

        if let Some(error) = failure {
            return self
                .fail_dispatch(turn_id, Some(assistant_id), error, max_messages)
                .await;
        }

        let (content, thread) = {
            let mut s = self.inner.session.lock();
            s.voice.awaiting_completion = false;
            s.phase = TurnPhase::Idle;
            let content = s
                .thread
                .message(assistant_id)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            s.thread.truncate_to(max_messages);
            (content, s.thread.clone())
        };

        self.emit(
            self.event(
                turn_id,
                TurnEventType::StreamCompleted,
                format!(
                    "Stream completed: {} fragments, {} anomalies",
                    fragments, anomalies
                ),
            )
            .with_duration(started.elapsed().as_millis() as u64),
        )
        .await;

        self.persist(turn_id, &thread).await;

        let voice_output = self.inner.settings.lock().voice_output;
        let speech = if voice_output && !content.trim().is_empty() {
            Some(self.speak_turn(turn_id, Some(assistant_id), &content).await)
        } else {
            None
        };

        self.emit(self.event(
            turn_id,
            TurnEventType::TurnCompleted,
            format!("Turn completed ({} chars)", content.chars().count()),
        ))
        .await;

        TurnOutcome::Completed {
            message_id: assistant_id,
            content,
            speech,
        }
    }

    /// Read the body to the end (or the sentinel), applying fragments in order
    async fn consume(
        &self,
        turn_id: Uuid,
        assistant_id: Uuid,
        mut body: ByteStream,
    ) -> (usize, usize, Option<String>) {
        let mut decoder = StreamDecoder::new();
        let mut failure = None;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    let decoded = decoder.feed(&bytes);
                    self.apply_decoded(turn_id, assistant_id, decoded).await;
                    if decoder.is_finished() {
                        debug!("Sentinel received, dropping response body");
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Response stream broke");
                    failure = Some(e.to_string());
                    break;
                }
            }
        }
        drop(body);

        if failure.is_none() {
            let rest = decoder.finish();
            self.apply_decoded(turn_id, assistant_id, rest).await;
        }

        (decoder.fragment_count(), decoder.anomaly_count(), failure)
    }

    async fn apply_decoded(&self, turn_id: Uuid, assistant_id: Uuid, decoded: Vec<Decoded>) {
        for item in decoded {
            match item {
                Decoded::Fragment(text) => {
                    {
                        let mut s = self.inner.session.lock();
                        if let Some(message) = s.thread.message_mut(assistant_id) {
                            message.content.push_str(&text);
                        }
                    }
                    self.emit(
                        self.event(
                            turn_id,
                            TurnEventType::FragmentReceived,
                            format!("Fragment of {} chars", text.chars().count()),
                        )
                        .with_fragment(text),
                    )
                    .await;
                }
                Decoded::Anomaly(line) => {
                    warn!(line = %line, "Dropped undecodable stream line");
                    let excerpt: String = line.chars().take(ANOMALY_EXCERPT_CHARS).collect();
                    self.emit(
                        self.event(turn_id, TurnEventType::DecodeAnomaly, "Dropped undecodable line")
                            .with_error(excerpt),
                    )
                    .await;
                }
            }
        }
    }

    async fn fail_dispatch(
        &self,
        turn_id: Uuid,
        assistant_id: Option<Uuid>,
        error: String,
        max_messages: usize,
    ) -> TurnOutcome {
        let (partial, thread) = {
            let mut s = self.inner.session.lock();
            s.voice.awaiting_completion = false;
            s.phase = TurnPhase::Idle;
            let partial = assistant_id
                .and_then(|id| s.thread.message(id))
                .map(|m| m.content.clone())
                .unwrap_or_default();
            s.thread.truncate_to(max_messages);
            (partial, s.thread.clone())
        };

        error!(error = %error, partial_chars = partial.len(), "Chat dispatch failed");
        self.emit(
            self.event(turn_id, TurnEventType::DispatchFailed, "Chat request failed")
                .with_error(error.clone()),
        )
        .await;
        self.persist(turn_id, &thread).await;
        self.emit(self.event(turn_id, TurnEventType::TurnCompleted, "Turn ended after dispatch failure"))
            .await;

        TurnOutcome::DispatchFailed { error, partial }
    }

    async fn persist(&self, turn_id: Uuid, thread: &ChatThread) {
        match self.inner.store.save(thread).await {
            Ok(()) => {
                self.emit(self.event(
                    turn_id,
                    TurnEventType::ThreadSaved,
                    format!("Saved thread ({} messages)", thread.messages.len()),
                ))
                .await
            }
            Err(e) => {
                error!(error = %e, "Failed to save thread");
                self.emit(
                    self.event(turn_id, TurnEventType::PersistFailed, "Failed to save thread")
                        .with_error(e.to_string()),
                )
                .await
            }
        }
    }

    async fn speak_turn(&self, turn_id: Uuid, message_id: Option<Uuid>, text: &str) -> SpeechOutcome {
        let (vendor, voice_id) = {
            let settings = self.inner.settings.lock();
            (settings.vendor, settings.voice_id.clone())
        };

        let ticket = {
            let mut s = self.inner.session.lock();
            if s.voice.speak_locked {
                Err(SpeechOutcome::Locked)
            } else if message_id.is_some() && s.last_spoken_id == message_id {
                Err(SpeechOutcome::AlreadySpoken)
            } else {
                if message_id.is_some() {
                    s.last_spoken_id = message_id;
                }
                s.voice.speak_locked = true;
                s.phase = TurnPhase::Speaking;
                Ok(s.generation)
            }
        };

        let ticket = match ticket {
            Ok(ticket) => ticket,
            Err(SpeechOutcome::Locked) => {
                self.emit(self.event(
                    turn_id,
                    TurnEventType::SynthesisDropped,
                    "Synthesis already in flight, request dropped",
                ))
                .await;
                return SpeechOutcome::Locked;
            }
            Err(outcome) => {
                debug!(?message_id, "Message already spoken");
                return outcome;
            }
        };

        self.emit(self.event(
            turn_id,
            TurnEventType::SynthesisStarted,
            format!("Synthesizing {} chars with {}", text.chars().count(), vendor),
        ))
        .await;

        let started = Instant::now();
        let request = TtsRequest::new(text, vendor).with_voice(voice_id);
        let output = match self.inner.synthesis.synthesize_detailed(&request).await {
            Ok(output) => output,
            Err(e) => {
                {
                    let mut s = self.inner.session.lock();
                    if s.generation == ticket {
                        s.voice.speak_locked = false;
                        s.phase = TurnPhase::Idle;
                    }
                }
                error!(error = %e, "Speech synthesis failed");
                self.emit(
                    self.event(turn_id, TurnEventType::SynthesisFailed, "Speech synthesis failed")
                        .with_error(e.to_string()),
                )
                .await;
                return SpeechOutcome::SynthesisFailed {
                    error: e.to_string(),
                };
            }
        };

        if output.retried {
            self.emit(self.event(
                turn_id,
                TurnEventType::SynthesisRetried,
                "Audio under size threshold, retried without markup",
            ))
            .await;
        }

        let source = {
            let mut s = self.inner.session.lock();
            if s.generation != ticket {
                None
            } else {
                let source = self.inner.playback.assign();
                s.voice.speaking = true;
                s.voice.pending_audio = Some(source);
                Some(source)
            }
        };

        let Some(source) = source else {
            info!("Discarding audio synthesized for an interrupted turn");
            self.emit(self.event(
                turn_id,
                TurnEventType::SynthesisDiscarded,
                "Audio discarded after interruption",
            ))
            .await;
            return SpeechOutcome::Discarded;
        };

        self.emit(
            self.event(
                turn_id,
                TurnEventType::PlaybackStarted,
                format!("Playing {} bytes as source {}", output.audio.len(), source),
            )
            .with_duration(started.elapsed().as_millis() as u64),
        )
        .await;

        let played = self.inner.playback.play(source, output.audio).await;

        {
            let mut s = self.inner.session.lock();
            if s.voice.pending_audio == Some(source) {
                s.voice.speaking = false;
                s.voice.speak_locked = false;
                s.voice.pending_audio = None;
                s.phase = TurnPhase::Idle;
            }
        }

        match played {
            Ok(PlaybackEnd::Finished) => {
                self.emit(self.event(turn_id, TurnEventType::PlaybackEnded, "Playback finished"))
                    .await;
                SpeechOutcome::Played
            }
            Ok(PlaybackEnd::Stopped) => {
                self.emit(self.event(turn_id, TurnEventType::PlaybackEnded, "Playback stopped"))
                    .await;
                SpeechOutcome::Stopped
            }
            Err(e) => {
                error!(error = %e, "Playback failed");
                self.emit(
                    self.event(turn_id, TurnEventType::PlaybackFailed, "Playback failed")
                        .with_error(e.to_string()),
                )
                .await;
                SpeechOutcome::PlaybackFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Build an event stamped with the current thread and phase
    fn event(&self, turn_id: Uuid, event_type: TurnEventType, summary: impl Into<String>) -> TurnEvent {
        let s = self.inner.session.lock();
        TurnEvent::new(turn_id, s.thread.id.clone(), event_type, s.phase, summary)
    }

    async fn emit(&self, event: TurnEvent) {
        self.inner.observer.record(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        ChatClient, DeepgramTranscriber, FileCapture, NullSink, SynthesisError, Synthesizer,
        WhisperTranscriber,
    };
    use crate::core::observer::RecordingObserver;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Counts calls and returns audio large enough to skip the retry
    #[derive(Default)]
    struct CountingSynth {
        texts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Synthesizer for CountingSynth {
        fn vendor(&self) -> TtsVendor {
            TtsVendor::ElevenLabs
        }

        async fn synthesize(
            &self,
            text: &str,
            _voice_id: Option<&str>,
        ) -> Result<Vec<u8>, SynthesisError> {
            self.texts.lock().push(text.to_string());
            Ok(vec![0u8; 16_384])
        }
    }

    fn orchestrator(synth: Arc<CountingSynth>, observer: Arc<RecordingObserver>) -> VoiceTurnOrchestrator {
        let unused = "http://127.0.0.1:9";
        let parts = Collaborators {
            capture: Arc::new(FileCapture::new("/nonexistent/clip.webm")),
            transcription: TranscriptionGateway::new(
                Arc::new(WhisperTranscriber::new(unused)),
                Arc::new(DeepgramTranscriber::new(unused)),
            ),
            chat: Arc::new(ChatClient::new(unused)),
            synthesis: SpeechSynthesisGateway::new().with_synthesizer(synth),
            sink: Arc::new(NullSink),
            store: Arc::new(MemoryStore::new()),
            observer,
        };
        VoiceTurnOrchestrator::new(
            ChatThread::with_id("t", ""),
            parts,
            OrchestratorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_message_is_spoken_once() {
        let synth = Arc::new(CountingSynth::default());
        let observer = Arc::new(RecordingObserver::new());
        let orchestrator = orchestrator(synth.clone(), observer.clone());
        let turn_id = Uuid::new_v4();
        let message_id = Some(Uuid::new_v4());

        let first = orchestrator.speak_turn(turn_id, message_id, "Hi!").await;
        let second = orchestrator.speak_turn(turn_id, message_id, "Hi!").await;

        assert_eq!(first, SpeechOutcome::Played);
        assert_eq!(second, SpeechOutcome::AlreadySpoken);
        assert_eq!(synth.texts.lock().len(), 1);
        assert_eq!(observer.count(TurnEventType::SynthesisStarted), 1);
        assert!(!orchestrator.state().speak_locked);
    }

    #[tokio::test]
    async fn test_new_message_is_spoken_after_previous() {
        let synth = Arc::new(CountingSynth::default());
        let orchestrator = orchestrator(synth.clone(), Arc::new(RecordingObserver::new()));
        let turn_id = Uuid::new_v4();

        orchestrator.speak_turn(turn_id, Some(Uuid::new_v4()), "One").await;
        let outcome = orchestrator.speak_turn(turn_id, Some(Uuid::new_v4()), "Two").await;

        assert_eq!(outcome, SpeechOutcome::Played);
        assert_eq!(
            *synth.texts.lock(),
            vec!["<speak>One</speak>", "<speak>Two</speak>"]
        );
    }

    #[test]
    fn test_release_speech_bumps_generation() {
        let mut session = Session {
            thread: ChatThread::with_id("t", ""),
            voice: VoiceTurnState {
                speaking: true,
                speak_locked: true,
                pending_audio: Some(3),
                ..Default::default()
            },
            phase: TurnPhase::Speaking,
            turn_id: None,
            generation: 4,
            last_spoken_id: None,
        };

        session.release_speech();
        assert_eq!(session.generation, 5);
        assert!(!session.voice.speaking);
        assert!(!session.voice.speak_locked);
        assert_eq!(session.voice.pending_audio, None);
    }

    #[test]
    fn test_default_settings() {
        let settings = OrchestratorSettings::default();
        assert!(settings.voice_output);
        assert_eq!(settings.max_messages, 100);
        assert_eq!(settings.vendor, TtsVendor::ElevenLabs);
    }
}
