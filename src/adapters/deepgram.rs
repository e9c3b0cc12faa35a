//! Secondary transcription client (Deepgram behind `/api/deepgram`).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{Transcriber, Transcript, TranscriptionError};
use crate::domain::AudioClip;

pub struct DeepgramTranscriber {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    #[serde(default)]
    transcript: String,
}

impl DeepgramTranscriber {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    fn name(&self) -> &str {
        "deepgram"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<Transcript, TranscriptionError> {
        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| TranscriptionError::Request(format!("mime: {}", e)))?;
        let form = Form::new().part("audio", part);

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
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        Ok(Transcript::new(result.transcript.trim()))
    }
}
