//! Incremental decoder for chat completion response bodies.
//!
//! The completion proxy has shipped three incompatible body encodings over
//! time, and all of them are still seen in the wild:
//!
//! - numbered tokens, one per line: `0:"Hel"`, `0:"lo"`, with single-letter
//!   metadata lines (`e:{...}`, `d:{...}`) mixed in
//! - server-sent events carrying JSON deltas: `data: {"choices":[{"delta":{"content":"Hel"}}]}`
//!   terminated by `data: [DONE]`
//! - raw, undifferentiated text
//!
//! The shape is probed once per response from the first content line, or
//! earlier when a partial first line already rules out both framed shapes.
//! The two line-oriented shapes still sniff every line, so a stream that mixes
//! them keeps decoding; raw text is passed through verbatim.

use futures::{Stream, StreamExt};
use serde_json::Value;

/// Terminates a stream, bare or as `data: [DONE]`
pub const DONE_SENTINEL: &str = "[DONE]";

const EVENT_PREFIX: &str = "data:";

/// Wire encoding of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    NumberedToken,
    SseDelta,
    RawText,
}

impl WireShape {
    /// Classify a complete line. `None` means the line does not tell
    /// (blank or metadata) and the next line should be probed instead.
    pub fn probe(line: &str) -> Option<WireShape> {
        let line = line.trim();
        if line.is_empty() || is_metadata(line) {
            return None;
        }
        if numbered_payload(line).is_some() {
            return Some(WireShape::NumberedToken);
        }
        if line.starts_with(EVENT_PREFIX) || line == DONE_SENTINEL {
            return Some(WireShape::SseDelta);
        }
        // Bare JSON chunks count as events; prose that opens with a brace does not
        if line.starts_with('{') && serde_json::from_str::<Value>(line).is_ok() {
            return Some(WireShape::SseDelta);
        }
        Some(WireShape::RawText)
    }

    /// Whether an incomplete first line may still turn out to be framed.
    /// `false` means it can only be raw text.
    fn may_be_framed(partial: &str) -> bool {
        let partial = partial.trim_start();
        let Some(first) = partial.chars().next() else {
            return true;
        };
        if first == '{' {
            return true;
        }

        let bytes = partial.as_bytes();
        let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            return matches!(bytes.get(digits), None | Some(b':'));
        }
        if first.is_ascii_alphabetic() && matches!(bytes.get(1), None | Some(b':')) {
            return true;
        }
        [EVENT_PREFIX, DONE_SENTINEL]
            .iter()
            .any(|frame| frame.starts_with(partial) || partial.starts_with(frame))
    }
}

/// Result of decoding one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Content to append to the assistant message
    Fragment(String),
    /// Keep-alive, metadata or framing without content
    Skip,
    /// Sentinel seen; stop reading
    Done,
    /// Line matched no known shape, or was JSON without content; dropped
    Anomaly,
}

/// Output of the streaming decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Fragment(String),
    /// The dropped line, for tracing
    Anomaly(String),
}

/// Decode a single line of a line-oriented body.
pub fn decode_line(line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skip;
    }
    if trimmed == DONE_SENTINEL {
        return LineOutcome::Done;
    }

    let content = match trimmed.strip_prefix(EVENT_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    };
    if content.is_empty() {
        return LineOutcome::Skip;
    }
    if content == DONE_SENTINEL {
        return LineOutcome::Done;
    }
    if is_metadata(content) {
        return LineOutcome::Skip;
    }

    if let Some(payload) = numbered_payload(content) {
        return match decode_numbered(payload) {
            Some(token) if !token.is_empty() => LineOutcome::Fragment(token),
            _ => LineOutcome::Skip,
        };
    }

    match serde_json::from_str::<Value>(content) {
        Ok(value) => match extract_delta(&value) {
            Some(delta) if !delta.is_empty() => LineOutcome::Fragment(delta),
            _ => LineOutcome::Anomaly,
        },
        Err(_) => LineOutcome::Anomaly,
    }
}

/// `e:{...}` style framing: one ASCII letter, then a colon
fn is_metadata(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Payload after a leading `<digits>:`
fn numbered_payload(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(':')
}

/// Quoted string tokens decode as JSON; broken quoting falls back to trimming
/// the quotes. Non-string JSON payloads are structured data parts, not text.
fn decode_numbered(payload: &str) -> Option<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(token)) => Some(token),
        Ok(_) => None,
        Err(_) => Some(payload.trim_matches('"').to_string()),
    }
}

/// Find the incremental content field of a JSON chunk
fn extract_delta(value: &Value) -> Option<String> {
    for pointer in ["/choices/0/delta/content", "/delta/content", "/delta/text"] {
        if let Some(text) = value.pointer(pointer).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    value
        .get("delta")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Stateful decoder fed with raw body chunks.
///
/// One decoder per response; create a fresh one for every turn.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of an incomplete UTF-8 sequence
    pending_bytes: Vec<u8>,
    /// Decoded text not yet consumed as complete lines
    buffer: String,
    shape: Option<WireShape>,
    finished: bool,
    fragments: usize,
    anomalies: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape detected so far, if any
    pub fn shape(&self) -> Option<WireShape> {
        self.shape
    }

    /// True once the sentinel was seen or `finish` was called
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies
    }

    /// Feed one chunk of the body; returns what became decodable.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        self.decode_utf8(chunk);

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.process_line(&line, &mut out);
            if self.finished {
                self.buffer.clear();
                return out;
            }
        }

        if self.shape.is_none()
            && !self.buffer.is_empty()
            && !WireShape::may_be_framed(&self.buffer)
        {
            self.shape = Some(WireShape::RawText);
        }

        if self.shape == Some(WireShape::RawText) && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.push_fragment(rest, &mut out);
        }

        out
    }

    /// Flush whatever is left once the body ends.
    pub fn finish(&mut self) -> Vec<Decoded> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.buffer.push_str(&tail);
        }

        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.process_line(&rest, &mut out);
        }

        self.finished = true;
        out
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<Decoded>) {
        if self.shape.is_none() {
            self.shape = WireShape::probe(line);
        }

        if self.shape == Some(WireShape::RawText) {
            if !line.is_empty() {
                self.push_fragment(line.to_string(), out);
            }
            return;
        }

        match decode_line(line) {
            LineOutcome::Fragment(text) => self.push_fragment(text, out),
            LineOutcome::Skip => {}
            LineOutcome::Done => self.finished = true,
            LineOutcome::Anomaly => {
                self.anomalies += 1;
                out.push(Decoded::Anomaly(line.trim().to_string()));
            }
        }
    }

    fn push_fragment(&mut self, text: String, out: &mut Vec<Decoded>) {
        self.fragments += 1;
        out.push(Decoded::Fragment(text));
    }

    /// Append decodable text to the buffer, keeping an incomplete trailing
    /// sequence for the next chunk. Invalid bytes become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending_bytes.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending_bytes.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + bad);
                        }
                        None => {
                            self.pending_bytes.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Adapt a body stream into a stream of text fragments.
///
/// Stops at the sentinel without polling the body again, which drops (and so
/// cancels) the underlying read. Anomalies are skipped; transport errors are
/// yielded and end the stream.
pub fn fragments<S, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
{
    struct State<S> {
        body: Option<S>,
        decoder: StreamDecoder,
        ready: std::collections::VecDeque<String>,
    }

    let state = State {
        body: Some(body),
        decoder: StreamDecoder::new(),
        ready: std::collections::VecDeque::new(),
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }

            let body = state.body.as_mut()?;
            let decoded = match body.next().await {
                Some(Ok(chunk)) => state.decoder.feed(&chunk),
                Some(Err(e)) => {
                    state.body = None;
                    return Some((Err(e), state));
                }
                None => state.decoder.finish(),
            };

            if state.decoder.is_finished() {
                state.body = None;
            }

            state.ready.extend(decoded.into_iter().filter_map(|d| match d {
                Decoded::Fragment(text) => Some(text),
                Decoded::Anomaly(_) => None,
            }));

            if state.body.is_none() && state.ready.is_empty() {
                return None;
            }
        }
    })
}
