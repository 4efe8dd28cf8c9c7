//! Per-request measurement records

use crate::error::ErrorKind;
use crate::traits::ClientError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One token arrival as produced by an endpoint client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEvent {
    /// When the chunk was received
    pub at: Instant,
    /// Tokens carried by this chunk
    pub tokens: usize,
}

impl TokenEvent {
    /// Create an event stamped now
    pub fn now(tokens: usize) -> Self {
        Self {
            at: Instant::now(),
            tokens,
        }
    }
}

/// One arrival as recorded by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalEvent {
    /// Arrival time
    pub at: Instant,
    /// Tokens added by this arrival
    pub delta: usize,
    /// Running total after this arrival
    pub cumulative: usize,
}

/// Terminal disposition of a request attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestStatus {
    /// Endpoint signalled completion
    Success,
    /// Request failed
    Error {
        /// Failure class
        kind: ErrorKind,
        /// Detail from the client
        reason: String,
    },
    /// Deadline elapsed before completion
    TimedOut,
}

impl RequestStatus {
    /// Whether the request completed
    pub fn is_success(&self) -> bool {
        matches!(self, RequestStatus::Success)
    }

    /// Failure class, if the request did not succeed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RequestStatus::Success => None,
            RequestStatus::Error { kind, .. } => Some(*kind),
            RequestStatus::TimedOut => Some(ErrorKind::Timeout),
        }
    }
}

impl From<ClientError> for RequestStatus {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(_) => RequestStatus::TimedOut,
            other => RequestStatus::Error {
                kind: other.kind(),
                reason: other.to_string(),
            },
        }
    }
}

/// Measurement of one request attempt
///
/// Built by a worker through [`PendingRecord`] and immutable once finished.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// Concurrency level the request ran under
    pub level: usize,
    /// Worker slot within the level
    pub slot: usize,
    /// Prompt sent
    pub prompt: Arc<str>,
    /// Dispatch time
    pub started_at: Instant,
    /// Arrivals in the order received
    pub events: Vec<ArrivalEvent>,
    /// Time the terminal status was reached
    pub ended_at: Instant,
    /// Terminal status
    pub status: RequestStatus,
    /// Final cumulative token count
    pub total_tokens: usize,
}

impl RequestRecord {
    /// Record for a worker task that died without reporting
    pub fn worker_lost(
        level: usize,
        slot: usize,
        prompt: Arc<str>,
        started_at: Instant,
        ended_at: Instant,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            level,
            slot,
            prompt,
            started_at,
            events: Vec::new(),
            ended_at: ended_at.max(started_at),
            status: RequestStatus::Error {
                kind: ErrorKind::ProtocolError,
                reason: reason.into(),
            },
            total_tokens: 0,
        }
    }

    /// Wall-clock time from dispatch to terminal status
    pub fn duration(&self) -> Duration {
        self.ended_at.duration_since(self.started_at)
    }

    /// Time from dispatch to the first arrival carrying tokens
    pub fn time_to_first_token(&self) -> Option<Duration> {
        self.events
            .iter()
            .find(|e| e.delta > 0)
            .map(|e| e.at.duration_since(self.started_at))
    }

    /// Tokens per second over the whole request, for successful requests
    pub fn token_rate(&self) -> Option<f64> {
        if !self.status.is_success() {
            return None;
        }
        let secs = self.duration().as_secs_f64();
        (secs > 0.0).then(|| self.total_tokens as f64 / secs)
    }
}

/// A record under construction, exclusively owned by its worker
#[derive(Debug)]
pub struct PendingRecord {
    level: usize,
    slot: usize,
    prompt: Arc<str>,
    started_at: Instant,
    events: Vec<ArrivalEvent>,
    cumulative: usize,
}

impl PendingRecord {
    /// Start a record at dispatch time
    pub fn new(level: usize, slot: usize, prompt: Arc<str>, started_at: Instant) -> Self {
        Self {
            level,
            slot,
            prompt,
            started_at,
            events: Vec::new(),
            cumulative: 0,
        }
    }

    /// Append an arrival
    ///
    /// Timestamps are clamped so the sequence never moves backwards or
    /// precedes dispatch.
    pub fn push(&mut self, event: TokenEvent) {
        let floor = self.events.last().map_or(self.started_at, |e| e.at);
        self.cumulative += event.tokens;
        self.events.push(ArrivalEvent {
            at: event.at.max(floor),
            delta: event.tokens,
            cumulative: self.cumulative,
        });
    }

    /// Tokens received so far
    pub fn cumulative(&self) -> usize {
        self.cumulative
    }

    /// Arrivals recorded so far
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has arrived yet
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Seal the record with its terminal status
    pub fn finish(self, status: RequestStatus, ended_at: Instant) -> RequestRecord {
        let floor = self.events.last().map_or(self.started_at, |e| e.at);
        RequestRecord {
            level: self.level,
            slot: self.slot,
            prompt: self.prompt,
            started_at: self.started_at,
            events: self.events,
            ended_at: ended_at.max(floor),
            status,
            total_tokens: self.cumulative,
        }
    }
}
