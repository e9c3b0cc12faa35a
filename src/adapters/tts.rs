//! Speech synthesis clients for the two TTS proxies.
//!
//! Both proxies accept `{text, voiceId?}` and answer with `audio/mpeg`
//! bytes, or a JSON error. Hume reports input problems as 422 with `detail`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{SynthesisError, Synthesizer};
use crate::domain::TtsVendor;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<&'a str>,
}

/// JSON-in, audio-out synthesis proxy
pub struct HttpSynthesizer {
    vendor: TtsVendor,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    pub fn new(vendor: TtsVendor, endpoint: impl Into<String>) -> Self {
        Self {
            vendor,
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn elevenlabs(endpoint: impl Into<String>) -> Self {
        Self::new(TtsVendor::ElevenLabs, endpoint)
    }

    pub fn hume(endpoint: impl Into<String>) -> Self {
        Self::new(TtsVendor::Hume, endpoint)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    fn vendor(&self) -> TtsVendor {
        self.vendor
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
    ) -> Result<Vec<u8>, SynthesisError> {
        let vendor = self.vendor;
        let body = SynthesisBody { text, voice_id };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Request {
                vendor,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
                return Err(SynthesisError::Validation {
                    vendor,
                    detail: validation_detail(&body),
                });
            }
            return Err(SynthesisError::Status {
                vendor,
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await.map_err(|e| SynthesisError::Request {
            vendor,
            message: e.to_string(),
        })?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio(vendor));
        }

        tracing::debug!(%vendor, bytes = audio.len(), "Synthesized audio");
        Ok(audio.to_vec())
    }
}

/// Pull `detail` (or `error`) out of a 422 body; fall back to the raw text
fn validation_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["detail", "error"].iter().find_map(|key| match json.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) if !other.is_null() => Some(other.to_string()),
                _ => None,
            })
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_uses_camel_case_voice_id() {
        let body = SynthesisBody {
            text: "hi",
            voice_id: Some("v1"),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"text":"hi","voiceId":"v1"}"#
        );

        let body = SynthesisBody {
            text: "hi",
            voice_id: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"text":"hi"}"#);
    }

    #[test]
    fn test_validation_detail() {
        assert_eq!(validation_detail(r#"{"detail":"text too long"}"#), "text too long");
        assert_eq!(validation_detail(r#"{"error":"bad voice"}"#), "bad voice");
        assert_eq!(
            validation_detail(r#"{"detail":[{"msg":"x"}]}"#),
            r#"[{"msg":"x"}]"#
        );
        assert_eq!(validation_detail("nope"), "nope");
    }
}
