//! In-process endpoint clients for tests

use crate::record::TokenEvent;
use crate::traits::{ClientError, EndpointClient, TokenStream};

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How a mock request behaves
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Emit `tokens` single-token arrivals evenly spread over `over`
    Steady { tokens: usize, over: Duration },
    /// Accept the request, then never send anything
    Hang,
    /// Fail at open with the given error
    FailOpen(ClientError),
    /// Emit `after` tokens at `interval`, then fail
    FailMidStream {
        after: usize,
        interval: Duration,
        error: ClientError,
    },
    /// Panic inside `open_stream`, killing the worker task
    Panic,
}

/// Scripted endpoint client
///
/// Every prompt uses the default behavior unless an override is registered
/// for it.
pub(crate) struct MockClient {
    default: Behavior,
    overrides: Vec<(String, Behavior)>,
    calls: AtomicUsize,
    prompts_seen: Mutex<Vec<String>>,
    opened_at: Mutex<Vec<Instant>>,
}

impl MockClient {
    pub(crate) fn new(default: Behavior) -> Self {
        Self {
            default,
            overrides: Vec::new(),
            calls: AtomicUsize::new(0),
            prompts_seen: Mutex::new(Vec::new()),
            opened_at: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn steady(tokens: usize, over: Duration) -> Self {
        Self::new(Behavior::Steady { tokens, over })
    }

    pub(crate) fn hanging() -> Self {
        Self::new(Behavior::Hang)
    }

    pub(crate) fn with_prompt(mut self, prompt: &str, behavior: Behavior) -> Self {
        self.overrides.push((prompt.to_string(), behavior));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts_seen(&self) -> Vec<String> {
        self.prompts_seen.lock().unwrap().clone()
    }

    /// When each request was opened, in call order
    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        self.opened_at.lock().unwrap().clone()
    }

    fn behavior_for(&self, prompt: &str) -> Behavior {
        self.overrides
            .iter()
            .find(|(p, _)| p == prompt)
            .map(|(_, b)| b.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

fn ticking(count: usize, interval: Duration, then: Option<ClientError>) -> TokenStream {
    Box::pin(stream::unfold(
        (0usize, then),
        move |(sent, then)| async move {
            if sent < count {
                tokio::time::sleep(interval).await;
                return Some((Ok(TokenEvent::now(1)), (sent + 1, then)));
            }
            then.map(|err| (Err(err), (sent, None)))
        },
    ))
}

#[async_trait]
impl EndpointClient for MockClient {
    fn endpoint(&self) -> &str {
        "mock://endpoint"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn open_stream(&self, prompt: &str) -> Result<TokenStream, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts_seen.lock().unwrap().push(prompt.to_string());
        self.opened_at.lock().unwrap().push(Instant::now());

        match self.behavior_for(prompt) {
            Behavior::Steady { tokens, over } => {
                let interval = over / tokens.max(1) as u32;
                Ok(ticking(tokens, interval, None))
            }
            Behavior::Hang => Ok(Box::pin(stream::pending::<Result<TokenEvent, ClientError>>())),
            Behavior::FailOpen(err) => Err(err),
            Behavior::FailMidStream {
                after,
                interval,
                error,
            } => Ok(ticking(after, interval, Some(error))),
            Behavior::Panic => panic!("mock client panicked on prompt {:?}", prompt),
        }
    }
}
