//! Chat messages and display chunking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a chat thread.
///
/// `content` may carry SSML-style markup when the assistant answered in voice
/// mode. It is only mutated while the message is the streaming placeholder of
/// the current turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a thread
    pub id: Uuid,

    pub role: Role,

    pub content: String,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Empty assistant placeholder filled in while a response streams
    pub fn assistant_placeholder() -> Self {
        Self::new(Role::Assistant, String::new())
    }
}

/// Messages shorter than this are never split for display
const SHORT_MESSAGE_CHARS: usize = 100;
/// Paragraphs shorter than this are kept whole
const SHORT_PARAGRAPH_CHARS: usize = 150;
/// Upper bound for a group of sentences
const MAX_CHUNK_CHARS: usize = 200;

/// Only long assistant replies are split into separate display bubbles.
pub fn should_split(message: &Message) -> bool {
    message.role == Role::Assistant && message.content.chars().count() > SHORT_MESSAGE_CHARS
}

/// Split a long reply into display chunks.
///
/// Numbered lists split per item; everything else splits per paragraph, and
/// long paragraphs are regrouped into sentence runs of at most 200 characters.
pub fn split_into_chunks(text: &str) -> Vec<String> {
    if text.chars().count() < SHORT_MESSAGE_CHARS {
        return vec![text.trim().to_string()];
    }

    if text.lines().any(is_numbered_item) {
        return split_list_items(text);
    }

    let mut chunks = Vec::new();
    for paragraph in split_paragraphs(text) {
        if paragraph.chars().count() < SHORT_PARAGRAPH_CHARS {
            chunks.push(paragraph.trim().to_string());
            continue;
        }

        let mut current = String::new();
        for sentence in split_sentences(paragraph) {
            let sentence = sentence.trim();
            if !current.is_empty()
                && current.chars().count() + sentence.chars().count() > MAX_CHUNK_CHARS
            {
                chunks.push(current.trim().to_string());
                current = sentence.to_string();
            } else if current.is_empty() {
                current = sentence.to_string();
            } else {
                current.push(' ');
                current.push_str(sentence);
            }
        }
        if !current.is_empty() {
            chunks.push(current.trim().to_string());
        }
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}

/// `1. item`, `  12. item`
fn is_numbered_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    let rest = &trimmed[digits..];
    rest.starts_with('.') && rest[1..].starts_with(char::is_whitespace)
}

fn split_list_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_numbered_item(line) && !current.is_empty() {
            items.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        items.push(current.join("\n"));
    }

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(|p| p.trim_matches('\n'))
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// Split after `.`, `!` or `?` when whitespace and an uppercase letter follow.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = paragraph.char_indices().collect();

    let mut i = 0;
    while i < chars.len() {
        let (_, c) = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].1.is_uppercase() {
                let end = chars[i + 1].0;
                sentences.push(&paragraph[start..end]);
                start = chars[j].0;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    sentences.push(&paragraph[start..]);
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_into_chunks("  Hi there!  "), vec!["Hi there!"]);
    }

    #[test]
    fn test_numbered_list_splits_per_item() {
        let text = "Here is the plan for this week, in order of priority:\n\
                    1. Write three sentences every night before bed\n\
                    2. Walk for twenty minutes after lunch\n\
                    3. Review the week on Sunday evening";
        let chunks = split_into_chunks(text);
        assert_eq!(chunks.len(), 4);
        assert!(chunks[1].starts_with("1. Write"));
        assert!(chunks[3].starts_with("3. Review"));
    }

    #[test]
    fn test_paragraphs_split() {
        let first = "Short opening paragraph that sets the scene for the rest of it.";
        let second = "A second paragraph, also short enough to stay whole as one chunk.";
        let text = format!("{}\n\n{}", first, second);
        assert_eq!(split_into_chunks(&text), vec![first, second]);
    }

    #[test]
    fn test_long_paragraph_groups_sentences() {
        let sentence = "This sentence is exactly long enough to matter here.";
        let paragraph = vec![sentence; 8].join(" ");
        let chunks = split_into_chunks(&paragraph);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
        }
        assert_eq!(chunks.join(" "), paragraph);
    }

    #[test]
    fn test_sentence_split_ignores_decimals() {
        let parts = split_sentences("Pi is 3.14 roughly. Next one");
        assert_eq!(parts, vec!["Pi is 3.14 roughly.", "Next one"]);
    }

    #[test]
    fn test_should_split_only_long_assistant() {
        let long = "x".repeat(150);
        assert!(should_split(&Message::new(Role::Assistant, long.clone())));
        assert!(!should_split(&Message::user(long)));
        assert!(!should_split(&Message::new(Role::Assistant, "short")));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
