//! Audio payloads and speech synthesis requests.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A recorded clip ready for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// A webm/opus recording, the browser recorder default
    pub fn webm(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "audio/webm", "recording.webm")
    }

    /// Build a clip from a file path, guessing the mime type from its extension
    pub fn from_path(path: &Path, bytes: Vec<u8>) -> Self {
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        Self::new(bytes, mime_for_extension(&extension), file_name)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Short content hash used to correlate trace events (16 hex chars)
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsVendor {
    /// Accepts SSML wrapped in `<speak>`
    #[default]
    ElevenLabs,
    /// Plain text only
    Hume,
}

impl TtsVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsVendor::ElevenLabs => "elevenlabs",
            TtsVendor::Hume => "hume",
        }
    }
}

impl std::fmt::Display for TtsVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TtsVendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elevenlabs" | "eleven" => Ok(TtsVendor::ElevenLabs),
            "hume" => Ok(TtsVendor::Hume),
            other => Err(format!("unknown TTS vendor: {}", other)),
        }
    }
}

/// One synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsRequest {
    pub text: String,
    pub vendor: TtsVendor,
    pub voice_id: Option<String>,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>, vendor: TtsVendor) -> Self {
        Self {
            text: text.into(),
            vendor,
            voice_id: None,
        }
    }

    pub fn with_voice(mut self, voice_id: Option<String>) -> Self {
        self.voice_id = voice_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_clip_from_path() {
        let clip = AudioClip::from_path(&PathBuf::from("/tmp/memo.M4A"), vec![1, 2, 3]);
        assert_eq!(clip.file_name, "memo.M4A");
        assert_eq!(clip.mime_type, "audio/mp4");
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = AudioClip::webm(b"same".to_vec());
        let b = AudioClip::webm(b"same".to_vec());
        let c = AudioClip::webm(b"different".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_vendor_parse() {
        assert_eq!("Hume".parse::<TtsVendor>().unwrap(), TtsVendor::Hume);
        assert_eq!("elevenlabs".parse::<TtsVendor>().unwrap(), TtsVendor::ElevenLabs);
        assert!("polly".parse::<TtsVendor>().is_err());
    }
}
