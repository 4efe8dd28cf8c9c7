//! Endpoint client trait
//!
//! Defined in core so the worker can drive any transport. The HTTP
//! implementation lives in `tokrate-vendors`; tests use in-process mocks.

use crate::error::ErrorKind;
use crate::record::TokenEvent;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// Lazy, finite, non-restartable sequence of token arrivals for one request
///
/// The stream ends (`None`) when the endpoint signals completion. An `Err`
/// item is terminal: nothing is read after it.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<TokenEvent, ClientError>> + Send>>;

/// Client for one configured streaming completion endpoint
///
/// Every call to [`open_stream`](EndpointClient::open_stream) issues exactly
/// one outbound request. Clients never retry.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// Endpoint URL (or a descriptive name for in-process clients)
    fn endpoint(&self) -> &str;

    /// Model identifier sent with each request
    fn model_name(&self) -> &str;

    /// Open one streaming request for `prompt`
    ///
    /// Resolves once response headers are accepted. Token arrivals are then
    /// read from the returned stream, each stamped when it was received.
    async fn open_stream(&self, prompt: &str) -> Result<TokenStream, ClientError>;
}

/// Errors signalled by an endpoint client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Transport could not be established or completed
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or unexpected response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credential rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No terminal signal within the allowed duration
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Map to the per-request error classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Connection(_) => ErrorKind::ConnectionError,
            ClientError::Protocol(_) => ErrorKind::ProtocolError,
            ClientError::Auth(_) => ErrorKind::AuthError,
            ClientError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}
