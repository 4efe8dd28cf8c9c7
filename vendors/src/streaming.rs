//! Streaming response processing for inference endpoints.
//!
//! This module provides parsers for the two streaming formats endpoints answer
//! with (SSE, JSON Lines) and a processor that turns parsed events into token
//! updates.
//!
//! Parsers buffer raw bytes and only decode complete events, so a multi-byte
//! UTF-8 sequence split across network chunks is decoded intact.

use serde_json::Value;

use crate::api::{ApiType, StreamFormat};

// ============================================================================
// Byte Buffer
// ============================================================================

/// Maximum buffer size (1MB) to prevent unbounded memory growth from malformed streams.
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Byte buffer shared by both parsers.
#[derive(Debug, Default)]
struct ByteBuffer {
    bytes: Vec<u8>,
    /// Whether the buffer has been truncated due to size limits
    truncated: bool,
}

impl ByteBuffer {
    fn extend(&mut self, chunk: &[u8], format: &str) {
        // CR never occurs inside a multi-byte sequence
        self.bytes
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        if self.bytes.len() > MAX_BUFFER_SIZE {
            if !self.truncated {
                tracing::warn!(
                    format,
                    limit = MAX_BUFFER_SIZE,
                    "Stream buffer exceeded limit, truncating. This may indicate a malformed stream."
                );
                self.truncated = true;
            }
            // Truncate at a newline boundary to avoid splitting events
            let target_start = self.bytes.len() - MAX_BUFFER_SIZE / 2;
            let start = find(&self.bytes[target_start..], b"\n")
                .map(|pos| target_start + pos + 1)
                .unwrap_or(target_start);
            self.bytes.drain(..start);
        }
    }

    /// Remove and return everything up to and including `delimiter`.
    fn take_through(&mut self, delimiter: &[u8]) -> Option<Vec<u8>> {
        let pos = find(&self.bytes, delimiter)?;
        let taken: Vec<u8> = self.bytes.drain(..pos + delimiter.len()).collect();
        self.truncated = false;
        Some(taken)
    }

    fn take_rest(&mut self) -> Vec<u8> {
        self.truncated = false;
        std::mem::take(&mut self.bytes)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Decode a complete event. Invalid UTF-8 becomes U+FFFD.
fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ============================================================================
// SSE Parser
// ============================================================================

/// Server-Sent Events (SSE) parser.
///
/// Handles the SSE protocol as used by OpenAI-compatible servers.
/// Buffers incoming bytes and extracts complete events.
///
/// # SSE Format
///
/// ```text
/// event: message
/// data: {"content": "Hello"}
///
/// data: {"content": " world"}
///
/// data: [DONE]
/// ```
#[derive(Debug, Default)]
pub struct SSEParser {
    buffer: ByteBuffer,
}

impl SSEParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and return any complete events.
    ///
    /// Incomplete events are buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SSEEvent> {
        self.buffer.extend(bytes, "sse");

        let mut events = Vec::new();
        while let Some(raw) = self.buffer.take_through(b"\n\n") {
            events.extend(parse_event(&decode(&raw)));
        }
        events
    }

    /// Parse whatever is left once the connection closed.
    ///
    /// Servers may omit the blank line after the final event.
    pub fn flush(&mut self) -> Option<SSEEvent> {
        let rest = self.buffer.take_rest();
        parse_event(&decode(&rest))
    }

    /// Check if the parser has buffered data.
    pub fn has_buffered_data(&self) -> bool {
        !self.buffer.bytes.is_empty()
    }
}

/// Parse a single SSE event from its text representation.
fn parse_event(raw: &str) -> Option<SSEEvent> {
    let mut data_lines = Vec::new();
    let mut event_type = None;

    for line in raw.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim().to_string());
        }
        // id, retry and comment lines carry nothing we measure
    }

    if data_lines.is_empty() {
        return None;
    }

    // Multiple data lines join with newlines
    let data = data_lines.join("\n");

    // Check for [DONE] marker (OpenAI convention)
    if data.trim() == "[DONE]" {
        return Some(SSEEvent::Done);
    }

    Some(SSEEvent::Data { data, event_type })
}

/// A single Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SSEEvent {
    /// Data event containing JSON payload.
    Data {
        /// The event data (usually JSON)
        data: String,
        /// Optional event type
        event_type: Option<String>,
    },
    /// End of stream marker (`[DONE]`)
    Done,
}

impl SSEEvent {
    /// Returns true if this is a Done event.
    pub fn is_done(&self) -> bool {
        matches!(self, SSEEvent::Done)
    }

    /// Returns the data if this is a Data event.
    pub fn data(&self) -> Option<&str> {
        match self {
            SSEEvent::Data { data, .. } => Some(data),
            SSEEvent::Done => None,
        }
    }
}

// ============================================================================
// JSON Lines Parser
// ============================================================================

/// JSON Lines (newline-delimited JSON) parser.
#[derive(Debug, Default)]
pub struct JsonLinesParser {
    buffer: ByteBuffer,
}

impl JsonLinesParser {
    /// Create a new JSON Lines parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return complete, non-blank JSON lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend(bytes, "json_lines");

        let mut lines = Vec::new();
        while let Some(raw) = self.buffer.take_through(b"\n") {
            let line = decode(&raw);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        lines
    }

    /// Return the unterminated final line, if any.
    pub fn flush(&mut self) -> Option<String> {
        let rest = decode(&self.buffer.take_rest());
        let trimmed = rest.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Check if the parser has buffered data.
    pub fn has_buffered_data(&self) -> bool {
        !self.buffer.bytes.is_empty()
    }
}

// ============================================================================
// JSON Payload Helpers
// ============================================================================

/// Extract the content delta of one chunk.
fn extract_content(api_type: ApiType, value: &Value) -> Option<&str> {
    let choice = || value.get("choices").and_then(|c| c.get(0));

    let content = match api_type {
        ApiType::OpenAI | ApiType::ThirdParty => choice()
            .and_then(|c| c.get("delta").or_else(|| c.get("message")))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str),
        ApiType::Vllm => choice()
            .and_then(|c| c.get("text"))
            .or_else(|| value.get("text"))
            .and_then(Value::as_str),
        ApiType::Ollama => value.get("response").and_then(Value::as_str),
    };

    content.filter(|c| !c.is_empty())
}

/// Whether the chunk carries a finish reason.
fn has_finish_reason(value: &Value) -> bool {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("finish_reason"))
        .map(|r| !r.is_null())
        .unwrap_or(false)
}

/// Completion tokens reported by the endpoint.
fn extract_completion_tokens(value: &Value) -> Option<usize> {
    value
        .get("usage")
        .and_then(|u| u.get("completion_tokens"))
        .or_else(|| value.get("eval_count"))
        .and_then(Value::as_u64)
        .map(|v| v as usize)
}

/// Message of an in-stream error payload.
fn extract_error(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    if error.is_null() {
        return None;
    }
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| error.as_str().map(str::to_string))
        .unwrap_or_else(|| error.to_string());
    Some(message)
}

// ============================================================================
// Stream Processor
// ============================================================================

/// What the processor learned from a batch of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Content arrived carrying this many tokens
    Tokens(usize),
    /// The endpoint signalled completion
    Completed {
        /// Completion tokens the endpoint reported, if any
        reported_tokens: Option<usize>,
    },
    /// The stream is unusable
    Failed(String),
}

/// High-level stream processor that handles both streaming formats.
///
/// Wraps the format-specific parser for one API type and tracks the
/// completion signal and reported usage across events.
pub struct StreamProcessor {
    api_type: ApiType,
    sse_parser: SSEParser,
    jsonl_parser: JsonLinesParser,
    finish_seen: bool,
    reported_tokens: Option<usize>,
    terminated: bool,
}

impl StreamProcessor {
    /// Create a new stream processor for the given API type.
    pub fn new(api_type: ApiType) -> Self {
        Self {
            api_type,
            sse_parser: SSEParser::new(),
            jsonl_parser: JsonLinesParser::new(),
            finish_seen: false,
            reported_tokens: None,
            terminated: false,
        }
    }

    /// Get the stream format.
    pub fn format(&self) -> StreamFormat {
        self.api_type.stream_format()
    }

    /// Whether a completion or failure has been produced.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Process incoming bytes and return the resulting updates.
    ///
    /// Nothing is returned once the stream has terminated.
    pub fn process(&mut self, bytes: &[u8]) -> Vec<StreamUpdate> {
        if self.terminated {
            return Vec::new();
        }

        let mut updates = Vec::new();
        match self.format() {
            StreamFormat::SSE => {
                for event in self.sse_parser.feed(bytes) {
                    self.handle_sse(event, &mut updates);
                }
            }
            StreamFormat::JsonLines => {
                for line in self.jsonl_parser.feed(bytes) {
                    self.handle_json(&line, &mut updates);
                }
            }
        }
        updates
    }

    /// Handle the end of the byte stream.
    ///
    /// A clean end after a finish reason counts as completion; any other
    /// end without a completion signal is a failure.
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        if self.terminated {
            return updates;
        }

        match self.format() {
            StreamFormat::SSE => {
                if let Some(event) = self.sse_parser.flush() {
                    self.handle_sse(event, &mut updates);
                }
            }
            StreamFormat::JsonLines => {
                if let Some(line) = self.jsonl_parser.flush() {
                    self.handle_json(&line, &mut updates);
                }
            }
        }

        if !self.terminated {
            if self.finish_seen {
                self.complete(&mut updates);
            } else {
                self.fail(
                    "stream ended without a completion signal".to_string(),
                    &mut updates,
                );
            }
        }
        updates
    }

    fn handle_sse(&mut self, event: SSEEvent, updates: &mut Vec<StreamUpdate>) {
        match event {
            SSEEvent::Done => self.complete(updates),
            SSEEvent::Data { data, .. } => self.handle_json(&data, updates),
        }
    }

    fn handle_json(&mut self, raw: &str, updates: &mut Vec<StreamUpdate>) {
        if self.terminated {
            return;
        }

        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparsable stream event");
                return;
            }
        };

        if let Some(message) = extract_error(&value) {
            self.fail(format!("endpoint error: {}", message), updates);
            return;
        }

        if let Some(content) = extract_content(self.api_type, &value) {
            if content.contains('\u{FFFD}') {
                self.fail("garbled output (invalid UTF-8)".to_string(), updates);
                return;
            }
            updates.push(StreamUpdate::Tokens(1));
        }

        if let Some(reported) = extract_completion_tokens(&value) {
            self.reported_tokens = Some(reported);
        }

        if has_finish_reason(&value) {
            self.finish_seen = true;
        }

        if self.api_type == ApiType::Ollama
            && value.get("done").and_then(Value::as_bool) == Some(true)
        {
            self.complete(updates);
        }
    }

    fn complete(&mut self, updates: &mut Vec<StreamUpdate>) {
        self.terminated = true;
        updates.push(StreamUpdate::Completed {
            reported_tokens: self.reported_tokens,
        });
    }

    fn fail(&mut self, reason: String, updates: &mut Vec<StreamUpdate>) {
        self.terminated = true;
        updates.push(StreamUpdate::Failed(reason));
    }
}

impl std::fmt::Debug for StreamProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProcessor")
            .field("api_type", &self.api_type)
            .field("finish_seen", &self.finish_seen)
            .field("reported_tokens", &self.reported_tokens)
            .field("terminated", &self.terminated)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
