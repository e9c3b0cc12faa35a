//! Turn commands: typed chat, spoken turns, one-off transcription and speech.
//!
//! - `parley chat` - typed turns, optionally spoken back
//! - `parley voice <clip>` - a spoken turn from a recording
//! - `parley transcribe <clip>` - transcript only
//! - `parley speak <text>` - synthesize to a file

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{
    AudioCapture, ChatClient, DeepgramTranscriber, FileCapture, FileSink, HttpSynthesizer,
    WhisperTranscriber,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    Collaborators, EventLog, Observers, OrchestratorSettings, SpeechOutcome,
    SpeechSynthesisGateway, TracingObserver, TranscriptionGateway, TurnObserver, TurnOutcome,
    VoiceTurnOrchestrator,
};
use crate::domain::{AudioClip, ChatThread, TtsRequest, TtsVendor, TurnEvent, TurnEventType};
use crate::prompts;
use crate::store::{JsonFileStore, PromptLibrary};

use super::resolve_thread;

/// Prints reply fragments as they stream in
#[derive(Debug, Default)]
pub struct StdoutObserver;

#[async_trait]
impl TurnObserver for StdoutObserver {
    async fn record(&self, event: &TurnEvent) {
        if event.event_type != TurnEventType::FragmentReceived {
            return;
        }
        if let Some(fragment) = &event.fragment {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(fragment.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Transcription gateway wired from config: Whisper first, Deepgram second
pub fn transcription_gateway(cfg: &ResolvedConfig) -> TranscriptionGateway {
    let whisper = WhisperTranscriber::new(cfg.endpoints.whisper.clone())
        .with_prompt(cfg.transcription.prompt.clone())
        .with_language(cfg.transcription.language.clone());
    let deepgram = DeepgramTranscriber::new(cfg.endpoints.deepgram.clone());

    TranscriptionGateway::new(Arc::new(whisper), Arc::new(deepgram))
        .with_timeout(cfg.transcription.timeout)
}

/// Synthesis gateway wired from config with both vendors registered
pub fn synthesis_gateway(cfg: &ResolvedConfig) -> SpeechSynthesisGateway {
    SpeechSynthesisGateway::new()
        .with_synthesizer(Arc::new(HttpSynthesizer::elevenlabs(
            cfg.endpoints.elevenlabs.clone(),
        )))
        .with_synthesizer(Arc::new(HttpSynthesizer::hume(cfg.endpoints.hume.clone())))
        .with_min_audio_bytes(cfg.synthesis.min_audio_bytes)
        .with_cue_mode(cfg.synthesis.cue_mode)
}

/// Build an orchestrator for `thread` backed by the on-disk store
pub fn build_orchestrator(
    cfg: &ResolvedConfig,
    thread: ChatThread,
    capture: Arc<dyn AudioCapture>,
    settings: OrchestratorSettings,
) -> Result<VoiceTurnOrchestrator> {
    let observer = Observers::new()
        .with(Arc::new(TracingObserver))
        .with(Arc::new(EventLog::new(config::turns_dir()?)))
        .with(Arc::new(StdoutObserver));

    let parts = Collaborators {
        capture,
        transcription: transcription_gateway(cfg),
        chat: Arc::new(ChatClient::new(cfg.endpoints.chat.clone())),
        synthesis: synthesis_gateway(cfg),
        sink: Arc::new(FileSink::new(config::audio_dir()?)),
        store: Arc::new(JsonFileStore::new(cfg.home.clone())),
        observer: Arc::new(observer),
    };

    Ok(VoiceTurnOrchestrator::new(thread, parts, settings))
}

/// Resolve a system prompt: built-in name, saved preset, or literal text
async fn resolve_prompt(store: &JsonFileStore, key: &str) -> Result<String> {
    if let Some(text) = prompts::builtin(key) {
        return Ok(text.to_string());
    }
    if let Some(preset) = store.find_prompt(key).await? {
        return Ok(preset.content);
    }
    Ok(key.to_string())
}

/// Load the named thread or start a new one
async fn open_thread(
    store: &JsonFileStore,
    thread: Option<String>,
    prompt: Option<String>,
) -> Result<ChatThread> {
    let prompt = match prompt {
        Some(key) => Some(resolve_prompt(store, &key).await?),
        None => None,
    };

    match thread {
        Some(key) => {
            let mut thread = resolve_thread(store, &key).await?;
            if let Some(prompt) = prompt {
                thread.system_prompt = prompt;
            }
            Ok(thread)
        }
        None => Ok(ChatThread::new(
            prompt.unwrap_or_else(|| prompts::DEFAULT_SYSTEM_PROMPT.to_string()),
        )),
    }
}

fn apply_vendor(settings: &mut OrchestratorSettings, vendor: Option<TtsVendor>) {
    if let Some(vendor) = vendor {
        settings.vendor = vendor;
    }
}

/// Send typed messages, from the argument or line by line from stdin
pub async fn execute_chat(
    message: Option<String>,
    thread: Option<String>,
    prompt: Option<String>,
    speak: bool,
    vendor: Option<TtsVendor>,
) -> Result<()> {
    let cfg = config::config()?;
    let store = JsonFileStore::new(cfg.home.clone());
    let thread = open_thread(&store, thread, prompt).await?;

    let mut settings = OrchestratorSettings::from_config(cfg);
    settings.voice_output = speak;
    apply_vendor(&mut settings, vendor);

    // Typed sessions never record
    let capture = Arc::new(FileCapture::new(PathBuf::new()));
    let orchestrator = build_orchestrator(cfg, thread, capture, settings)?;

    if let Some(message) = message {
        let outcome = orchestrator.send_text(&message).await;
        report_turn(&outcome);
        println!("\nThread: {}", orchestrator.thread_id());
        return exit_status(&outcome);
    }

    println!("Thread: {}", orchestrator.thread_id());
    println!("Type a message and press enter. Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/stop" => {
                if !orchestrator.stop_speaking().await {
                    println!("(nothing playing)");
                }
                continue;
            }
            text => {
                let outcome = orchestrator.send_text(text).await;
                report_turn(&outcome);
            }
        }
    }

    println!();
    Ok(())
}

/// Run one spoken turn using a recording as the microphone
pub async fn execute_voice(
    audio: &Path,
    thread: Option<String>,
    speak: bool,
    vendor: Option<TtsVendor>,
) -> Result<()> {
    let cfg = config::config()?;
    let store = JsonFileStore::new(cfg.home.clone());
    let thread = open_thread(&store, thread, None).await?;

    let mut settings = OrchestratorSettings::from_config(cfg);
    settings.voice_output = speak;
    apply_vendor(&mut settings, vendor);

    let capture = Arc::new(FileCapture::new(audio));
    let orchestrator = build_orchestrator(cfg, thread, capture, settings)?;

    orchestrator
        .start_capture()
        .await
        .with_context(|| format!("Could not capture from {}", audio.display()))?;

    let outcome = orchestrator.finish_capture().await;
    let transcript = orchestrator.transcript();
    if !transcript.is_empty() {
        println!("You said: {}\n", transcript);
    }
    report_turn(&outcome);
    println!("\nThread: {}", orchestrator.thread_id());

    exit_status(&outcome)
}

/// Transcribe a recording and print the text
pub async fn execute_transcribe(audio: &Path) -> Result<()> {
    let cfg = config::config()?;
    let bytes = tokio::fs::read(audio)
        .await
        .with_context(|| format!("Failed to read {}", audio.display()))?;
    let clip = AudioClip::from_path(audio, bytes);

    let outcome = transcription_gateway(cfg).transcribe_detailed(&clip).await;

    if let Some(error) = &outcome.primary_error {
        eprintln!("Primary transcription failed: {}", error);
    }
    if outcome.text.is_empty() {
        if let Some(error) = &outcome.secondary_error {
            eprintln!("Secondary transcription failed: {}", error);
        }
        anyhow::bail!("No speech recognised in {}", audio.display());
    }

    println!("{}", outcome.text);
    tracing::info!(
        vendor = outcome.vendor.as_deref().unwrap_or("-"),
        duration_ms = outcome.duration_ms,
        "Transcribed {}",
        audio.display()
    );
    Ok(())
}

/// Synthesize text and write the audio to a file
pub async fn execute_speak(
    text: &str,
    vendor: Option<TtsVendor>,
    voice: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let cfg = config::config()?;
    let vendor = vendor.unwrap_or(cfg.synthesis.vendor);
    let voice = voice.or_else(|| cfg.synthesis.voice_id.clone());

    let request = TtsRequest::new(text, vendor).with_voice(voice);
    let result = synthesis_gateway(cfg)
        .synthesize_detailed(&request)
        .await
        .with_context(|| format!("Synthesis via {} failed", vendor))?;

    let path = match output {
        Some(path) => path,
        None => {
            let dir = config::audio_dir()?;
            dir.join(format!("speak-{}.mp3", chrono::Utc::now().format("%Y%m%d-%H%M%S")))
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, &result.audio)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Wrote {} bytes from {}{} to {}",
        result.audio.len(),
        result.vendor,
        if result.retried { " (plain-text retry)" } else { "" },
        path.display()
    );
    Ok(())
}

/// Print how a turn ended. Reply text was already streamed to stdout.
fn report_turn(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed { speech, .. } => {
            println!();
            if let Some(speech) = speech {
                report_speech(speech);
            }
        }
        TurnOutcome::NoInput => println!("(nothing heard)"),
        TurnOutcome::Busy => println!("(still working on the previous turn)"),
        TurnOutcome::CaptureFailed { error } => eprintln!("Capture failed: {}", error),
        TurnOutcome::DispatchFailed { error, partial } => {
            if !partial.is_empty() {
                println!();
            }
            eprintln!("Chat request failed: {}", error);
        }
    }
}

fn report_speech(outcome: &SpeechOutcome) {
    match outcome {
        SpeechOutcome::Played => println!("(spoken)"),
        SpeechOutcome::Locked => println!("(speech skipped, another reply is being synthesized)"),
        SpeechOutcome::AlreadySpoken => {}
        SpeechOutcome::Discarded | SpeechOutcome::Stopped => println!("(speech interrupted)"),
        SpeechOutcome::SynthesisFailed { error } => eprintln!("Speech synthesis failed: {}", error),
        SpeechOutcome::PlaybackFailed { error } => eprintln!("Playback failed: {}", error),
    }
}

fn exit_status(outcome: &TurnOutcome) -> Result<()> {
    match outcome {
        TurnOutcome::CaptureFailed { error } => anyhow::bail!("Capture failed: {}", error),
        TurnOutcome::DispatchFailed { error, .. } => anyhow::bail!("Chat request failed: {}", error),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SystemPrompt;
    use crate::store::ChatSessionStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_resolve_prompt_order() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        store
            .save_prompt(&SystemPrompt::new("Pirate", "Talk like a pirate."))
            .await
            .unwrap();

        assert_eq!(
            resolve_prompt(&store, "voice").await.unwrap(),
            prompts::DEFAULT_VOICE_PROMPT
        );
        assert_eq!(
            resolve_prompt(&store, "pirate").await.unwrap(),
            "Talk like a pirate."
        );
        assert_eq!(
            resolve_prompt(&store, "Be brief.").await.unwrap(),
            "Be brief."
        );
    }

    #[tokio::test]
    async fn test_open_thread_overrides_prompt() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path());
        store.save(&ChatThread::with_id("t-1", "old")).await.unwrap();

        let thread = open_thread(&store, Some("t-1".into()), Some("default".into()))
            .await
            .unwrap();
        assert_eq!(thread.system_prompt, prompts::DEFAULT_SYSTEM_PROMPT);

        let fresh = open_thread(&store, None, None).await.unwrap();
        assert_eq!(fresh.system_prompt, prompts::DEFAULT_SYSTEM_PROMPT);
        assert!(fresh.messages.is_empty());
    }
}
