//! Command-line interface for parley.
//!
//! Provides commands for typed and spoken turns, one-off transcription and
//! synthesis, and managing saved threads, prompt presets and turn logs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::core::EventLog;
use crate::domain::{should_split, split_into_chunks, ChatThread, Role, TtsVendor, TurnRecord, TurnStatus};
use crate::store::{sorted_by_activity, ChatSessionStore, JsonFileStore};

pub mod prompts;
pub mod voice;

/// parley - voice-turn chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a typed message (interactive when no message is given)
    Chat {
        /// Message text; reads lines from stdin when omitted
        message: Option<String>,

        /// Continue an existing thread (id or unique prefix)
        #[arg(short, long)]
        thread: Option<String>,

        /// System prompt: preset name/id or built-in (default, voice, ssml)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Speak replies
        #[arg(long)]
        speak: bool,

        /// TTS vendor (elevenlabs, hume)
        #[arg(long)]
        vendor: Option<TtsVendor>,
    },

    /// Run a spoken turn from a recording
    Voice {
        /// Audio file standing in for the microphone
        audio: PathBuf,

        /// Continue an existing thread (id or unique prefix)
        #[arg(short, long)]
        thread: Option<String>,

        /// Do not speak the reply
        #[arg(long)]
        no_speak: bool,

        /// TTS vendor (elevenlabs, hume)
        #[arg(long)]
        vendor: Option<TtsVendor>,
    },

    /// Transcribe a recording and print the text
    Transcribe {
        audio: PathBuf,
    },

    /// Synthesize text to an mp3 file
    Speak {
        text: String,

        /// TTS vendor (elevenlabs, hume)
        #[arg(long)]
        vendor: Option<TtsVendor>,

        /// Voice id passed to the vendor
        #[arg(long)]
        voice: Option<String>,

        /// Output file (defaults to $PARLEY_HOME/audio/speak-<n>.mp3)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List saved threads
    Threads {
        /// Maximum number of threads to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print a thread
    Show {
        /// Thread id or unique prefix
        thread_id: String,
    },

    /// Delete a thread and its turn log
    Delete {
        /// Thread id or unique prefix
        thread_id: String,
    },

    /// Manage system prompt presets
    Prompts {
        #[command(subcommand)]
        command: prompts::PromptCommands,
    },

    /// Show the turn log of a thread
    Events {
        /// Thread id or unique prefix
        thread_id: String,

        /// Summarise per turn instead of listing every event
        #[arg(long)]
        turns: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Chat {
                message,
                thread,
                prompt,
                speak,
                vendor,
            } => voice::execute_chat(message, thread, prompt, speak, vendor).await,
            Commands::Voice {
                audio,
                thread,
                no_speak,
                vendor,
            } => voice::execute_voice(&audio, thread, !no_speak, vendor).await,
            Commands::Transcribe { audio } => voice::execute_transcribe(&audio).await,
            Commands::Speak {
                text,
                vendor,
                voice,
                output,
            } => voice::execute_speak(&text, vendor, voice, output).await,
            Commands::Threads { limit } => list_threads(limit).await,
            Commands::Show { thread_id } => show_thread(&thread_id).await,
            Commands::Delete { thread_id } => delete_thread(&thread_id).await,
            Commands::Prompts { command } => prompts::execute(command).await,
            Commands::Events { thread_id, turns } => show_events(&thread_id, turns).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Find a thread by exact id or unique id prefix
pub(crate) async fn resolve_thread(store: &dyn ChatSessionStore, key: &str) -> Result<ChatThread> {
    let mut all = store.load_all().await?;
    if let Some(thread) = all.remove(key) {
        return Ok(thread);
    }

    let matches: Vec<String> = all.keys().filter(|id| id.starts_with(key)).cloned().collect();
    match matches.as_slice() {
        [id] => all
            .remove(id)
            .with_context(|| format!("Thread '{}' vanished", id)),
        [] => anyhow::bail!("No thread matches '{}'", key),
        _ => anyhow::bail!(
            "'{}' is ambiguous, matches {} threads:\n  {}",
            key,
            matches.len(),
            matches.join("\n  ")
        ),
    }
}

/// List saved threads, most recently active first
async fn list_threads(limit: usize) -> Result<()> {
    let store = JsonFileStore::open_default()?;
    let threads = sorted_by_activity(store.load_all().await?);

    if threads.is_empty() {
        println!("No threads found");
        return Ok(());
    }

    println!("{:<38} {:<6} {:<20} TITLE", "THREAD ID", "MSGS", "LAST ACTIVE");
    println!("{}", "-".repeat(90));

    for thread in threads.into_iter().take(limit) {
        let last = thread
            .last_message()
            .map(|m| m.timestamp.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let title = if thread.title.is_empty() {
            "(untitled)"
        } else {
            thread.title.as_str()
        };
        println!(
            "{:<38} {:<6} {:<20} {}",
            thread.id,
            thread.messages.len(),
            last,
            title
        );
    }

    Ok(())
}

/// Print a thread, splitting long replies into readable chunks
async fn show_thread(key: &str) -> Result<()> {
    let store = JsonFileStore::open_default()?;
    let thread = resolve_thread(&store, key).await?;

    println!("Thread: {}", thread.id);
    if !thread.title.is_empty() {
        println!("Title:  {}", thread.title);
    }
    println!("Prompt: {}", first_line(&thread.system_prompt));
    println!();

    for message in &thread.messages {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        println!("[{}] {}:", message.timestamp.format("%H:%M:%S"), speaker);

        if should_split(message) {
            for chunk in split_into_chunks(&message.content) {
                println!("  {}", chunk);
                println!();
            }
        } else {
            println!("  {}", message.content);
            println!();
        }
    }

    Ok(())
}

/// Delete a thread and its turn log
async fn delete_thread(key: &str) -> Result<()> {
    let store = JsonFileStore::open_default()?;
    let thread = resolve_thread(&store, key).await?;

    store.delete(&thread.id).await?;
    EventLog::open_default()?.remove(&thread.id).await?;

    println!("Deleted thread {}", thread.id);
    Ok(())
}

/// Show the turn log of a thread
async fn show_events(key: &str, per_turn: bool) -> Result<()> {
    let store = JsonFileStore::open_default()?;
    let thread_id = match resolve_thread(&store, key).await {
        Ok(thread) => thread.id,
        // Logs can outlive their thread
        Err(_) => key.to_string(),
    };

    let log = EventLog::open_default()?;
    let events = log.replay(&thread_id).await?;
    if events.is_empty() {
        println!("No events for thread {}", thread_id);
        return Ok(());
    }

    if per_turn {
        println!("{:<38} {:<12} {:<6} {:<6} {:<6} STARTED", "TURN ID", "STATUS", "FRAGS", "ANOM", "SPOKE");
        println!("{}", "-".repeat(95));
        for turn in TurnRecord::from_log(&events) {
            println!(
                "{:<38} {:<12} {:<6} {:<6} {:<6} {}",
                turn.turn_id,
                status_label(&turn.status),
                turn.fragments,
                turn.anomalies,
                if turn.spoke { "yes" } else { "no" },
                turn.started_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        return Ok(());
    }

    for event in events {
        let mut line = format!(
            "{} {:<24} {:<13} {}",
            event.timestamp.format("%H:%M:%S%.3f"),
            format!("{:?}", event.event_type),
            event.phase.to_string(),
            event.summary
        );
        if let Some(ms) = event.duration_ms {
            line.push_str(&format!(" ({}ms)", ms));
        }
        if let Some(error) = &event.error {
            line.push_str(&format!(" - {}", error));
        }
        println!("{}", line);
    }

    Ok(())
}

fn status_label(status: &TurnStatus) -> &'static str {
    match status {
        TurnStatus::InProgress => "in-progress",
        TurnStatus::Completed => "completed",
        TurnStatus::NoSpeech => "no-speech",
        TurnStatus::Interrupted => "interrupted",
        TurnStatus::Failed { .. } => "failed",
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("parley configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Chats:     {}", cfg.home.join("chats.json").display());
    println!("  Prompts:   {}", cfg.home.join("prompts.json").display());
    println!("  Turn logs: {}", config::turns_dir()?.display());
    println!("  Audio:     {}", config::audio_dir()?.display());
    println!();
    println!("Endpoints:");
    println!("  Chat:       {}", cfg.endpoints.chat);
    println!("  Whisper:    {}", cfg.endpoints.whisper);
    println!("  Deepgram:   {}", cfg.endpoints.deepgram);
    println!("  ElevenLabs: {}", cfg.endpoints.elevenlabs);
    println!("  Hume:       {}", cfg.endpoints.hume);
    println!();
    println!("Transcription:");
    println!("  Primary timeout: {}ms", cfg.transcription.timeout.as_millis());
    println!("  Language:        {}", cfg.transcription.language.as_deref().unwrap_or("(auto)"));
    println!();
    println!("Synthesis:");
    println!("  Vendor:          {}", cfg.synthesis.vendor);
    println!("  Voice id:        {}", cfg.synthesis.voice_id.as_deref().unwrap_or("(vendor default)"));
    println!("  Min audio bytes: {}", cfg.synthesis.min_audio_bytes);
    println!("  Cue mode:        {:?}", cfg.synthesis.cue_mode);
    println!();
    println!("Conversation:");
    println!("  Max messages: {}", cfg.conversation.max_messages);
    println!("  Voice output: {}", cfg.conversation.voice_output);
    println!("  Voice prompt: {}", first_line(&cfg.conversation.voice_prompt));

    Ok(())
}
