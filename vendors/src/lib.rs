//! HTTP streaming clients for inference endpoints
//!
//! This crate provides the `EndpointClient` implementation used by the
//! tokrate binary:
//!
//! - OpenAI chat completions
//! - Third-party OpenAI-compatible servers
//! - vLLM completions
//! - Ollama generate
//!
//! Responses are parsed incrementally (SSE or JSON Lines) and turned into
//! token arrival events.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod streaming;

pub use api::{ApiType, StreamFormat};
pub use client::{token_stream, HttpClientPool, HttpConfig, HttpEndpointClient, VendorError};
pub use streaming::{JsonLinesParser, SSEEvent, SSEParser, StreamProcessor, StreamUpdate};
