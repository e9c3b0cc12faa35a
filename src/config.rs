//! Configuration for parley.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PARLEY_HOME, PARLEY_BASE_URL)
//! 2. Config file (.parley/config.yaml)
//! 3. Defaults (~/.parley, proxy at http://localhost:3000)
//!
//! Config file discovery:
//! - Searches current directory and parents for .parley/config.yaml
//! - `paths.home` in the config file is relative to the .parley/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::sanitize::CueMode;
use crate::core::synthesis::DEFAULT_MIN_AUDIO_BYTES;
use crate::core::transcription::DEFAULT_PRIMARY_TIMEOUT;
use crate::domain::{TtsVendor, DEFAULT_MAX_MESSAGES};
use crate::prompts::DEFAULT_VOICE_PROMPT;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub transcription: Option<TranscriptionConfig>,
    #[serde(default)]
    pub synthesis: Option<SynthesisConfig>,
    #[serde(default)]
    pub conversation: Option<ConversationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .parley/)
    pub home: Option<String>,
}

/// Endpoint URLs. Unset entries are derived from `base_url`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointsConfig {
    pub base_url: Option<String>,
    pub chat: Option<String>,
    pub whisper: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub hume: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub timeout_ms: Option<u64>,
    /// Vocabulary hint passed to the primary vendor
    pub prompt: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    pub vendor: Option<TtsVendor>,
    pub voice_id: Option<String>,
    pub min_audio_bytes: Option<usize>,
    pub cue_mode: Option<CueMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    pub max_messages: Option<usize>,
    pub voice_output: Option<bool>,
    pub voice_prompt: Option<String>,
}

/// Resolved configuration with absolute paths and full URLs
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory (chats, prompts, turn logs, audio)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub endpoints: Endpoints,
    pub transcription: TranscriptionSettings,
    pub synthesis: SynthesisSettings,
    pub conversation: ConversationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub chat: String,
    pub whisper: String,
    pub deepgram: String,
    pub elevenlabs: String,
    pub hume: String,
}

impl Endpoints {
    /// The proxy routes under `base_url`
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            chat: format!("{}/api/chat", base),
            whisper: format!("{}/api/whisper", base),
            deepgram: format!("{}/api/deepgram", base),
            elevenlabs: format!("{}/api/elevenlabs", base),
            hume: format!("{}/api/hume", base),
        }
    }

    pub fn synthesis(&self, vendor: TtsVendor) -> &str {
        match vendor {
            TtsVendor::ElevenLabs => &self.elevenlabs,
            TtsVendor::Hume => &self.hume,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_base(DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    pub timeout: Duration,
    pub prompt: Option<String>,
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PRIMARY_TIMEOUT,
            prompt: None,
            language: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub vendor: TtsVendor,
    pub voice_id: Option<String>,
    pub min_audio_bytes: usize,
    pub cue_mode: CueMode,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            vendor: TtsVendor::default(),
            voice_id: None,
            min_audio_bytes: DEFAULT_MIN_AUDIO_BYTES,
            cue_mode: CueMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub max_messages: usize,
    pub voice_output: bool,
    pub voice_prompt: String,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            voice_output: true,
            voice_prompt: DEFAULT_VOICE_PROMPT.to_string(),
        }
    }
}

/// Environment overrides, captured once so resolution stays testable
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    home: Option<PathBuf>,
    base_url: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var("PARLEY_HOME").ok().map(PathBuf::from),
            base_url: std::env::var("PARLEY_BASE_URL").ok(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".parley").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Combine file settings, environment and defaults
fn resolve(
    config_path: Option<&Path>,
    file: ConfigFile,
    env: EnvOverrides,
    default_home: PathBuf,
) -> ResolvedConfig {
    let home = match (env.home, &file.paths.home, config_path) {
        (Some(home), _, _) => home,
        (None, Some(home), Some(path)) => {
            let parley_dir = path.parent().unwrap_or(Path::new("."));
            resolve_path(parley_dir, home)
        }
        _ => default_home,
    };

    let endpoints_cfg = file.endpoints;
    let base_url = env
        .base_url
        .or(endpoints_cfg.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let derived = Endpoints::from_base(&base_url);
    let endpoints = Endpoints {
        chat: endpoints_cfg.chat.unwrap_or(derived.chat),
        whisper: endpoints_cfg.whisper.unwrap_or(derived.whisper),
        deepgram: endpoints_cfg.deepgram.unwrap_or(derived.deepgram),
        elevenlabs: endpoints_cfg.elevenlabs.unwrap_or(derived.elevenlabs),
        hume: endpoints_cfg.hume.unwrap_or(derived.hume),
    };

    let transcription_defaults = TranscriptionSettings::default();
    let transcription = match file.transcription {
        Some(t) => TranscriptionSettings {
            timeout: t
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(transcription_defaults.timeout),
            prompt: t.prompt,
            language: t.language,
        },
        None => transcription_defaults,
    };

    let synthesis_defaults = SynthesisSettings::default();
    let synthesis = match file.synthesis {
        Some(s) => SynthesisSettings {
            vendor: s.vendor.unwrap_or(synthesis_defaults.vendor),
            voice_id: s.voice_id,
            min_audio_bytes: s.min_audio_bytes.unwrap_or(synthesis_defaults.min_audio_bytes),
            cue_mode: s.cue_mode.unwrap_or(synthesis_defaults.cue_mode),
        },
        None => synthesis_defaults,
    };

    let conversation_defaults = ConversationSettings::default();
    let conversation = match file.conversation {
        Some(c) => ConversationSettings {
            max_messages: c.max_messages.unwrap_or(conversation_defaults.max_messages),
            voice_output: c.voice_output.unwrap_or(conversation_defaults.voice_output),
            voice_prompt: c.voice_prompt.unwrap_or(conversation_defaults.voice_prompt),
        },
        None => conversation_defaults,
    };

    ResolvedConfig {
        home,
        config_file: config_path.map(Path::to_path_buf),
        endpoints,
        transcription,
        synthesis,
        conversation,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".parley");

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    Ok(resolve(
        config_file.as_deref(),
        file,
        EnvOverrides::from_env(),
        default_home,
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the parley home directory
pub fn parley_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Per-thread turn logs ($PARLEY_HOME/turns)
pub fn turns_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("turns"))
}

/// Where the file sink writes synthesized audio ($PARLEY_HOME/audio)
pub fn audio_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("audio"))
}
