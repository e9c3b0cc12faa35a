//! Per-vendor text cleanup before speech synthesis.
//!
//! Voice-mode replies carry SSML (`<speak>`, `<break/>`, `<emphasis>`...) and
//! square-bracket emotion cues such as `[laughs]`. ElevenLabs reads the cues
//! aloud literally, so they are always stripped; Hume takes plain text only.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::TtsVendor;

static BRACKET_CUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]+\]").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static SPEAK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?speak>").unwrap());
static BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<break[^>]*/>").unwrap());
static CONTENT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:emphasis|prosody|phoneme)[^>]*>([^<]*)</(?:emphasis|prosody|phoneme)>")
        .unwrap()
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Cues with an SSML rendering, used by [`CueMode::Map`]
const CUE_MAP: &[(&str, &str)] = &[
    ("[laughs]", r#"<break time="250ms"/>"#),
    ("[sighs]", r#"<break time="300ms"/>"#),
    ("[soft exhale]", r#"<break time="200ms"/>"#),
    ("[whispers]", r#"<prosody volume="soft">"#),
    ("[excited]", r#"<prosody rate="fast" pitch="+10%">"#),
    ("[sarcastic]", r#"<emphasis level="moderate">"#),
];

/// How emotion cues are treated for SSML-capable vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueMode {
    /// Remove cues
    #[default]
    Strip,
    /// Leave cues for vendors with native audio tags
    Keep,
    /// Rewrite known cues as SSML, strip the rest
    Map,
}

/// Clean `text` for the given vendor. `mode` only applies to SSML vendors.
pub fn sanitize_for_vendor(text: &str, vendor: TtsVendor, mode: CueMode) -> String {
    match vendor {
        TtsVendor::ElevenLabs => sanitize_with_mode(text, mode),
        TtsVendor::Hume => strip_markup(text),
    }
}

/// Strip bracket cues, ensure a `<speak>` root, collapse whitespace.
pub fn sanitize_ssml(raw: &str) -> String {
    let stripped = BRACKET_CUE.replace_all(raw, "");
    let wrapped = ensure_speak_root(stripped.trim());
    MULTI_SPACE.replace_all(&wrapped, " ").into_owned()
}

/// Remove all markup and cues, keeping the spoken words.
pub fn strip_markup(text: &str) -> String {
    let text = SPEAK_TAG.replace_all(text, "");
    let text = BREAK_TAG.replace_all(&text, " ");
    let text = CONTENT_TAG.replace_all(&text, "$1");
    let text = BRACKET_CUE.replace_all(&text, "");
    let text = ANY_TAG.replace_all(&text, "");
    MULTI_SPACE.replace_all(&text, " ").trim().to_string()
}

/// Rewrite known emotion cues into SSML equivalents
pub fn map_emotion_cues(text: &str) -> String {
    CUE_MAP
        .iter()
        .fold(text.to_string(), |acc, (cue, ssml)| acc.replace(cue, ssml))
}

/// SSML sanitizing with an explicit cue policy
pub fn sanitize_with_mode(raw: &str, mode: CueMode) -> String {
    match mode {
        CueMode::Strip => sanitize_ssml(raw),
        CueMode::Keep => ensure_speak_root(raw),
        CueMode::Map => sanitize_ssml(&map_emotion_cues(raw)),
    }
}

fn ensure_speak_root(text: &str) -> String {
    if text.trim_start().starts_with("<speak>") {
        text.to_string()
    } else {
        format!("<speak>{}</speak>", text)
    }
}
