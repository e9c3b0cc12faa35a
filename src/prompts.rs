//! Built-in system prompts.

/// Prompt for new typed threads
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Plain-speech prompt for voice turns
pub const DEFAULT_VOICE_PROMPT: &str = "\
You are a friendly assistant talking with someone out loud.

Keep replies short and conversational. Prefer everyday words and contractions.
Split long ideas into several short sentences so they are easy to follow by ear.
Do not use lists, headings, code blocks or other visual formatting.";

/// Voice prompt for SSML-capable vendors: replies are wrapped in `<speak>` and
/// may carry pacing tags and bracketed emotion cues, which the sanitizer
/// strips or maps before synthesis.
pub const SSML_VOICE_PROMPT: &str = r#"You are a concise spoken coach. Your words are read aloud by a text-to-speech engine.

Output only SSML, never markdown:
- Wrap the whole reply in <speak>...</speak>.
- Use short sentences.
- Use <break time="300ms"/> for a thoughtful pause.
- Use <emphasis level="strong">word</emphasis> sparingly to stress a word.
- Use <prosody rate="slow">phrase</prosody> to slow down for something important.
- Emotion cues such as [laughs] or [sighs] go in square brackets before the sentence they colour.

Finish with one clear next step."#;

/// Resolve a built-in prompt by short name
pub fn builtin(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "default" => Some(DEFAULT_SYSTEM_PROMPT),
        "voice" => Some(DEFAULT_VOICE_PROMPT),
        "ssml" => Some(SSML_VOICE_PROMPT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin("Voice"), Some(DEFAULT_VOICE_PROMPT));
        assert!(builtin("ssml").is_some_and(|p| p.contains("<speak>")));
        assert_eq!(builtin("unknown"), None);
    }
}
