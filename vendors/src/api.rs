//! API flavours and their request shapes
//!
//! This module provides the API-type enumeration, the streaming format each
//! flavour answers with, and the JSON body each one expects.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// API Type Enumeration
// ============================================================================

/// Supported endpoint API flavours.
///
/// Used for configuration parsing and request shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApiType {
    /// OpenAI chat completions
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    /// OpenAI-compatible chat completions hosted by a third party
    #[serde(rename = "thirdparty")]
    ThirdParty,
    /// vLLM completions endpoint
    #[serde(rename = "vllm")]
    Vllm,
    /// Ollama generate endpoint
    #[serde(rename = "ollama")]
    Ollama,
}

impl ApiType {
    /// Returns the display name for this API type.
    pub fn display_name(&self) -> &'static str {
        match self {
            ApiType::OpenAI => "OpenAI",
            ApiType::ThirdParty => "Third-party (OpenAI compatible)",
            ApiType::Vllm => "vLLM",
            ApiType::Ollama => "Ollama",
        }
    }

    /// Returns the identifier string for this API type.
    pub fn id(&self) -> &'static str {
        match self {
            ApiType::OpenAI => "openai",
            ApiType::ThirdParty => "thirdparty",
            ApiType::Vllm => "vllm",
            ApiType::Ollama => "ollama",
        }
    }

    /// Returns the streaming format the endpoint answers with.
    pub fn stream_format(&self) -> StreamFormat {
        match self {
            ApiType::OpenAI | ApiType::ThirdParty | ApiType::Vllm => StreamFormat::SSE,
            ApiType::Ollama => StreamFormat::JsonLines,
        }
    }

    /// Build the streaming request body for one prompt.
    pub fn request_body(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Value {
        match self {
            ApiType::OpenAI => json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": max_tokens,
                "temperature": temperature,
                "stream": true,
                "stream_options": { "include_usage": true },
            }),
            ApiType::ThirdParty => json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": max_tokens,
                "temperature": temperature,
                "stream": true,
            }),
            ApiType::Vllm => json!({
                "model": model,
                "prompt": prompt,
                "max_tokens": max_tokens,
                "temperature": temperature,
                "stream": true,
            }),
            ApiType::Ollama => json!({
                "model": model,
                "prompt": prompt,
                "stream": true,
                "options": {
                    "num_predict": max_tokens,
                    "temperature": temperature,
                },
            }),
        }
    }

    /// Returns all supported API types.
    pub fn all() -> &'static [ApiType] {
        &[
            ApiType::OpenAI,
            ApiType::ThirdParty,
            ApiType::Vllm,
            ApiType::Ollama,
        ]
    }
}

impl std::fmt::Display for ApiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ApiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ApiType::OpenAI),
            "thirdparty" | "third_party" | "third-party" => Ok(ApiType::ThirdParty),
            "vllm" => Ok(ApiType::Vllm),
            "ollama" => Ok(ApiType::Ollama),
            _ => Err(format!("Unknown API type: {}", s)),
        }
    }
}

// ============================================================================
// Stream Format
// ============================================================================

/// Streaming response format used by an API type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamFormat {
    /// Server-Sent Events (OpenAI, third-party, vLLM)
    #[serde(rename = "sse")]
    SSE,
    /// JSON Lines / newline-delimited JSON (Ollama)
    #[serde(rename = "json_lines")]
    JsonLines,
}

impl StreamFormat {
    /// Returns true if this format uses SSE protocol.
    pub fn is_sse(&self) -> bool {
        matches!(self, StreamFormat::SSE)
    }

    /// Returns the expected Content-Type header for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            StreamFormat::SSE => "text/event-stream",
            StreamFormat::JsonLines => "application/x-ndjson",
        }
    }
}
