//! HTTP endpoint client with connection pooling.
//!
//! `HttpEndpointClient` implements `EndpointClient` over one shared
//! `reqwest::Client`: it posts the streaming request for its API type and
//! turns the response body into token arrival events.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use tokrate_core::{ClientError, EndpointClient, RunConfig, TokenEvent, TokenStream};

use crate::api::ApiType;
use crate::streaming::{StreamProcessor, StreamUpdate};

/// Longest slice of an error body carried into the error message.
const ERROR_BODY_SNIPPET: usize = 200;

/// Errors raised while constructing a client.
#[derive(Debug, Error)]
pub enum VendorError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint is not a usable URL.
    #[error("invalid endpoint URL `{url}`: {reason}")]
    InvalidEndpoint {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

// ============================================================================
// HTTP Client Pool
// ============================================================================

/// Configuration for the HTTP client pool.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Idle connection timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Request timeout (backstop; workers enforce the per-request deadline)
    pub request_timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// TCP keepalive interval
    pub tcp_keepalive: Option<Duration>,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: format!("tokrate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Create config with custom request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create config with custom connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create config with custom pool size.
    pub fn with_pool_max_idle(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }
}

/// Shared HTTP client with connection pooling.
///
/// All workers of a run issue their requests through one pool, so
/// connections are reused across levels.
///
/// # Example
///
/// ```rust,ignore
/// let pool = HttpClientPool::new(&HttpConfig::default())?;
/// let client = HttpEndpointClient::new(&pool, &run_config, ApiType::OpenAI)?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientPool {
    /// The underlying reqwest client
    client: Client,

    /// Configuration used to create this pool
    config: HttpConfig,
}

impl HttpClientPool {
    /// Create a new HTTP client pool with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, VendorError> {
        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if let Some(keepalive) = config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Get a reference to the underlying HTTP client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the configuration for this pool.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

// ============================================================================
// Endpoint Client
// ============================================================================

/// Streaming client for one endpoint, model and API type.
#[derive(Clone)]
pub struct HttpEndpointClient {
    http: Client,
    api_type: ApiType,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl HttpEndpointClient {
    /// Create a client for the endpoint described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an absolute http(s) URL.
    pub fn new(
        pool: &HttpClientPool,
        config: &RunConfig,
        api_type: ApiType,
    ) -> Result<Self, VendorError> {
        let invalid = |reason: String| VendorError::InvalidEndpoint {
            url: config.endpoint.clone(),
            reason,
        };
        let url = reqwest::Url::parse(&config.endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
        }

        Ok(Self {
            http: pool.client().clone(),
            api_type,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout,
        })
    }

    /// API type this client speaks.
    pub fn api_type(&self) -> ApiType {
        self.api_type
    }
}

#[async_trait]
impl EndpointClient for HttpEndpointClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn open_stream(&self, prompt: &str) -> Result<TokenStream, ClientError> {
        let body =
            self.api_type
                .request_body(&self.model, prompt, self.max_tokens, self.temperature);

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, self.api_type.stream_format().content_type())
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let timeout = self.timeout;
        let response = request.send().await.map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = format!("HTTP {}: {}", status.as_u16(), snippet(&text));
            tracing::debug!(status = status.as_u16(), endpoint = %self.endpoint, "Request rejected");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(detail),
                _ => ClientError::Protocol(detail),
            });
        }

        let bytes = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| classify(e, timeout)));

        Ok(token_stream(bytes, StreamProcessor::new(self.api_type)))
    }
}

impl std::fmt::Debug for HttpEndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpointClient")
            .field("api_type", &self.api_type)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(timeout)
    } else if err.is_decode() {
        ClientError::Protocol(err.to_string())
    } else {
        ClientError::Connection(err.to_string())
    }
}

fn snippet(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_SNIPPET) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

// ============================================================================
// Token Stream
// ============================================================================

struct StreamState<S> {
    bytes: Pin<Box<S>>,
    processor: StreamProcessor,
    pending: VecDeque<Result<TokenEvent, ClientError>>,
    cumulative: usize,
    done: bool,
}

impl<S> StreamState<S> {
    fn apply(&mut self, updates: Vec<StreamUpdate>) {
        for update in updates {
            match update {
                StreamUpdate::Tokens(tokens) => {
                    self.cumulative += tokens;
                    self.pending.push_back(Ok(TokenEvent::now(tokens)));
                }
                StreamUpdate::Completed { reported_tokens } => {
                    // Top up to the reported usage; never count down
                    let extra = reported_tokens
                        .and_then(|reported| reported.checked_sub(self.cumulative))
                        .filter(|&extra| extra > 0);
                    if let Some(extra) = extra {
                        self.cumulative += extra;
                        self.pending.push_back(Ok(TokenEvent::now(extra)));
                    }
                    self.done = true;
                }
                StreamUpdate::Failed(reason) => {
                    self.pending.push_back(Err(ClientError::Protocol(reason)));
                    self.done = true;
                }
            }
        }
    }
}

/// Turn a response body into token arrival events.
///
/// The stream ends after the completion signal without waiting for the
/// connection to close. A transport error or a failed body ends it with
/// one `Err` item.
pub fn token_stream<S, B>(bytes: S, processor: StreamProcessor) -> TokenStream
where
    S: Stream<Item = Result<B, ClientError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        processor,
        pending: VecDeque::new(),
        cumulative: 0,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let updates = state.processor.process(chunk.as_ref());
                    state.apply(updates);
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e));
                    state.done = true;
                }
                None => {
                    let updates = state.processor.finish();
                    state.apply(updates);
                    state.done = true;
                }
            }
        }
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn pool() -> HttpClientPool {
        HttpClientPool::new(&HttpConfig::default()).unwrap()
    }

    fn run_config(url: String) -> RunConfig {
        RunConfig::new(url, "test-model")
            .with_api_key("test-key")
            .with_max_tokens(64)
            .with_timeout(Duration::from_secs(5))
    }

    async fn collect(stream: TokenStream) -> Vec<Result<usize, ClientError>> {
        stream
            .map(|item| item.map(|event| event.tokens))
            .collect()
            .await
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, ClientError>> {
        let owned: Vec<Result<Vec<u8>, ClientError>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    const OPENAI_SSE: &str = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":5}}\n\n\
data: [DONE]\n\n";

    #[test]
    fn test_http_client_pool_creation() {
        let pool = pool();

        assert_eq!(pool.config().request_timeout, Duration::from_secs(300));
        assert_eq!(pool.config().pool_max_idle_per_host, 32);
        assert!(pool.config().user_agent.starts_with("tokrate/"));
    }

    #[test]
    fn test_http_config_builder() {
        let config = HttpConfig::default()
            .with_request_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(10))
            .with_pool_max_idle(16);

        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_max_idle_per_host, 16);
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let err = HttpEndpointClient::new(
            &pool(),
            &run_config("not a url".into()),
            ApiType::OpenAI,
        )
        .unwrap_err();
        assert!(matches!(err, VendorError::InvalidEndpoint { .. }));

        let err = HttpEndpointClient::new(
            &pool(),
            &run_config("ftp://example.com/v1".into()),
            ApiType::OpenAI,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = HttpEndpointClient::new(
            &pool(),
            &run_config("http://localhost:8000/v1/chat/completions".into()),
            ApiType::OpenAI,
        )
        .unwrap();

        let debug = format!("{:?}", client);
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(snippet(&long).chars().count(), ERROR_BODY_SNIPPET);
        assert_eq!(snippet("  short  "), "short");
    }

    // ========================================================================
    // Token stream
    // ========================================================================

    #[tokio::test]
    async fn test_token_stream_tops_up_reported_usage() {
        let stream = token_stream(
            chunks(&[OPENAI_SSE]),
            StreamProcessor::new(ApiType::OpenAI),
        );

        let events = collect(stream).await;
        assert_eq!(events, vec![Ok(1), Ok(1), Ok(3)]);
    }

    #[tokio::test]
    async fn test_token_stream_ignores_smaller_reported_usage() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"completion_tokens\":1}}\n\n\
data: [DONE]\n\n";
        let stream = token_stream(chunks(&[body]), StreamProcessor::new(ApiType::OpenAI));

        assert_eq!(collect(stream).await, vec![Ok(1), Ok(1)]);
    }

    #[tokio::test]
    async fn test_token_stream_handles_split_chunks() {
        let stream = token_stream(
            chunks(&[
                "data: {\"choices\":[{\"delta\":{\"con",
                "tent\":\"x\"}}]}\n",
                "\ndata: [DO",
                "NE]\n\n",
            ]),
            StreamProcessor::new(ApiType::ThirdParty),
        );

        assert_eq!(collect(stream).await, vec![Ok(1)]);
    }

    #[tokio::test]
    async fn test_token_stream_stops_at_done_without_eof() {
        let body = chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\ndata: [DONE]\n\n"])
            .chain(stream::pending());
        let stream = token_stream(body, StreamProcessor::new(ApiType::OpenAI));

        assert_eq!(collect(stream).await, vec![Ok(1)]);
    }

    #[tokio::test]
    async fn test_token_stream_transport_error_ends_stream() {
        let body = chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n"])
            .chain(stream::iter(vec![Err(ClientError::Connection(
                "connection reset".into(),
            ))]));
        let stream = token_stream(body, StreamProcessor::new(ApiType::OpenAI));

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                Ok(1),
                Err(ClientError::Connection("connection reset".into()))
            ]
        );
    }

    #[tokio::test]
    async fn test_token_stream_eof_without_completion() {
        let stream = token_stream(
            chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n"]),
            StreamProcessor::new(ApiType::OpenAI),
        );

        let events = collect(stream).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(ClientError::Protocol(_))));
    }

    // ========================================================================
    // Against a mock server
    // ========================================================================

    #[tokio::test]
    async fn test_openai_request_shape_and_stream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("Authorization", "Bearer test-key")
                    .header("Accept", "text/event-stream")
                    .body_contains("\"model\":\"test-model\"")
                    .body_contains("\"stream\":true")
                    .body_contains("\"include_usage\":true");
                then.status(200)
                    .header("Content-Type", "text/event-stream")
                    .body(OPENAI_SSE);
            })
            .await;

        let client = HttpEndpointClient::new(
            &pool(),
            &run_config(server.url("/v1/chat/completions")),
            ApiType::OpenAI,
        )
        .unwrap();

        let stream = client.open_stream("ping").await.unwrap();
        let events = collect(stream).await;

        assert_eq!(events, vec![Ok(1), Ok(1), Ok(3)]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ollama_json_lines_stream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("\"num_predict\":64");
                then.status(200)
                    .header("Content-Type", "application/x-ndjson")
                    .body(
                        "{\"response\":\"Hi\",\"done\":false}\n\
{\"response\":\" there\",\"done\":false}\n\
{\"response\":\"\",\"done\":true,\"eval_count\":2}\n",
                    );
            })
            .await;

        let client = HttpEndpointClient::new(
            &pool(),
            &run_config(server.url("/api/generate")),
            ApiType::Ollama,
        )
        .unwrap();

        let events = collect(client.open_stream("ping").await.unwrap()).await;

        assert_eq!(events, vec![Ok(1), Ok(1)]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/unauthorized");
                then.status(401).body("{\"error\":\"invalid api key\"}");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/forbidden");
                then.status(403).body("forbidden");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/broken");
                then.status(500).body("internal failure");
            })
            .await;

        let open = |path: &str| {
            let client = HttpEndpointClient::new(
                &pool(),
                &run_config(server.url(path)),
                ApiType::ThirdParty,
            )
            .unwrap();
            async move { client.open_stream("ping").await.err() }
        };

        assert!(matches!(open("/unauthorized").await, Some(ClientError::Auth(m)) if m.contains("401")));
        assert!(matches!(open("/forbidden").await, Some(ClientError::Auth(_))));
        match open("/broken").await {
            Some(ClientError::Protocol(message)) => {
                assert!(message.contains("HTTP 500"));
                assert!(message.contains("internal failure"));
            }
            other => panic!("expected protocol error, got {:?}", other.map(|e| e.to_string())),
        }
    }

    #[tokio::test]
    async fn test_in_stream_error_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/completions");
                then.status(200).body(
                    "data: {\"choices\":[{\"text\":\"a\"}]}\n\n\
data: {\"error\":{\"message\":\"out of memory\"}}\n\n",
                );
            })
            .await;

        let client = HttpEndpointClient::new(
            &pool(),
            &run_config(server.url("/v1/completions")),
            ApiType::Vllm,
        )
        .unwrap();

        let events = collect(client.open_stream("ping").await.unwrap()).await;
        assert_eq!(events[0], Ok(1));
        assert!(matches!(&events[1], Err(ClientError::Protocol(m)) if m.contains("out of memory")));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/slow");
                then.status(200).delay(Duration::from_secs(3)).body("data: [DONE]\n\n");
            })
            .await;

        let config = run_config(server.url("/slow")).with_timeout(Duration::from_millis(200));
        let client = HttpEndpointClient::new(&pool(), &config, ApiType::OpenAI).unwrap();

        let err = client.open_stream("ping").await.err();
        assert_eq!(err, Some(ClientError::Timeout(Duration::from_millis(200))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let client = HttpEndpointClient::new(
            &pool(),
            &run_config("http://127.0.0.1:1/v1/chat/completions".into()),
            ApiType::OpenAI,
        )
        .unwrap();

        let err = client.open_stream("ping").await.err();
        assert!(matches!(err, Some(ClientError::Connection(_))));
    }
}
