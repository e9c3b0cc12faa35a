//! Primary transcription client (Whisper behind the proxy's `/api/whisper`).
//!
//! The proxy forwards to a turbo Whisper model which cannot translate. When
//! the vendor rejects a clip for that reason the proxy answers 400 with
//! "translation" in the error, and the clip should go to the secondary vendor.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use super::{Transcriber, Transcript, TranscriptionError};
use crate::domain::AudioClip;

/// Substring in a 400 body that marks an expected fallback
const FALLBACK_MARKER: &str = "translation";

/// Whisper transcription via multipart upload
pub struct WhisperTranscriber {
    endpoint: String,
    /// Vocabulary hint for proper nouns
    prompt: Option<String>,
    language: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
}

impl WhisperTranscriber {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            prompt: None,
            language: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    fn build_form(&self, clip: &AudioClip) -> Result<Form, TranscriptionError> {
        let file_part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| TranscriptionError::Request(format!("mime: {}", e)))?;

        let mut form = Form::new().part("file", file_part);
        if let Some(prompt) = &self.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<Transcript, TranscriptionError> {
        let form = self.build_form(clip)?;

        tracing::debug!(bytes = clip.bytes.len(), "Sending clip to Whisper");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::BAD_REQUEST && is_fallback_marker(&body) {
                return Err(TranscriptionError::Unsupported(body));
            }
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        Ok(Transcript {
            text: result.text.trim().to_string(),
            duration_seconds: result.duration,
        })
    }
}

/// Whether a 400 body signals "use the secondary vendor" rather than a
/// broken request. Heuristic: the vendor only exposes this as message text.
pub fn is_fallback_marker(body: &str) -> bool {
    let contains_marker = |s: &str| s.to_ascii_lowercase().contains(FALLBACK_MARKER);

    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let candidates = [
                json.pointer("/error/message"),
                json.pointer("/error"),
                json.pointer("/details/error/message"),
            ];
            candidates
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .any(contains_marker)
        }
        Err(_) => contains_marker(body),
    }
}
