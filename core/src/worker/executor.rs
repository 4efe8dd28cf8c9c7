//! Worker request lifecycle

use crate::cancel::CancelReceiver;
use crate::record::{PendingRecord, RequestRecord, RequestStatus};
use crate::traits::EndpointClient;

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Result of running one worker
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The request reached a terminal status
    Finished(RequestRecord),
    /// The run was abandoned while the request was in flight
    Abandoned,
}

impl WorkerOutcome {
    /// The record, if the worker finished
    pub fn into_record(self) -> Option<RequestRecord> {
        match self {
            WorkerOutcome::Finished(record) => Some(record),
            WorkerOutcome::Abandoned => None,
        }
    }
}

/// Worker drives exactly one streaming request end to end
///
/// Failures of the request are captured in the returned record's status and
/// never propagate, so one bad request cannot disturb sibling workers.
pub struct Worker {
    /// Slot within the level
    slot: usize,

    /// Concurrency level this request belongs to
    level: usize,

    /// Prompt to send
    prompt: Arc<str>,

    /// Endpoint client (shared across workers via Arc)
    client: Arc<dyn EndpointClient>,

    /// Hard deadline measured from dispatch
    timeout: Duration,
}

impl Worker {
    /// Create a new worker
    ///
    /// Use `WorkerBuilder` for validated construction.
    pub fn new(
        slot: usize,
        level: usize,
        prompt: Arc<str>,
        client: Arc<dyn EndpointClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            slot,
            level,
            prompt,
            client,
            timeout,
        }
    }

    /// Run the request to a terminal status
    ///
    /// Returns `Abandoned` only when the run is abandoned mid-flight.
    pub async fn run(self, mut cancel: CancelReceiver) -> WorkerOutcome {
        let started_at = Instant::now();
        let deadline = started_at + self.timeout;
        let mut pending = PendingRecord::new(self.level, self.slot, self.prompt.clone(), started_at);

        tracing::debug!(level = self.level, slot = self.slot, "Worker dispatching request");

        let status = tokio::select! {
            biased;

            _ = cancel.abandoned() => {
                tracing::debug!(level = self.level, slot = self.slot, "Worker abandoned");
                return WorkerOutcome::Abandoned;
            }

            status = self.drive(&mut pending, deadline) => status,
        };

        let record = pending.finish(status, Instant::now());

        match &record.status {
            RequestStatus::Success => tracing::debug!(
                level = self.level,
                slot = self.slot,
                tokens = record.total_tokens,
                elapsed_ms = record.duration().as_millis() as u64,
                "Request completed"
            ),
            RequestStatus::TimedOut => tracing::warn!(
                level = self.level,
                slot = self.slot,
                tokens = record.total_tokens,
                timeout_ms = self.timeout.as_millis() as u64,
                "Request timed out"
            ),
            RequestStatus::Error { kind, reason } => tracing::warn!(
                level = self.level,
                slot = self.slot,
                kind = %kind,
                error = %reason,
                "Request failed"
            ),
        }

        WorkerOutcome::Finished(record)
    }

    /// Open the stream and consume it until a terminal status
    ///
    /// The deadline bounds the open and every read. Dropping the stream on
    /// expiry cancels the in-flight request.
    async fn drive(&self, pending: &mut PendingRecord, deadline: Instant) -> RequestStatus {
        let mut stream = match timeout_at(deadline, self.client.open_stream(&self.prompt)).await {
            Err(_) => return RequestStatus::TimedOut,
            Ok(Err(e)) => return e.into(),
            Ok(Ok(stream)) => stream,
        };

        loop {
            match timeout_at(deadline, stream.next()).await {
                Err(_) => return RequestStatus::TimedOut,
                Ok(None) => return RequestStatus::Success,
                Ok(Some(Ok(event))) => pending.push(event),
                Ok(Some(Err(e))) => return e.into(),
            }
        }
    }

    /// Slot within the level
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Prompt this worker sends
    pub fn prompt(&self) -> &Arc<str> {
        &self.prompt
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("slot", &self.slot)
            .field("level", &self.level)
            .field("endpoint", &self.client.endpoint())
            .field("timeout", &self.timeout)
            .finish()
    }
}
