//! Builder pattern for Worker construction

use crate::error::{BenchError, BenchResult};
use crate::traits::EndpointClient;

use super::executor::Worker;

use std::sync::Arc;
use std::time::Duration;

/// Builder for creating Worker instances
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0)
///     .level(4)
///     .prompt("Explain TCP slow start")
///     .client(client)
///     .timeout(Duration::from_secs(60))
///     .build()?;
/// ```
pub struct WorkerBuilder {
    slot: usize,
    level: Option<usize>,
    prompt: Option<Arc<str>>,
    client: Option<Arc<dyn EndpointClient>>,
    timeout: Option<Duration>,
}

impl WorkerBuilder {
    /// Create a new builder for the given slot
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            level: None,
            prompt: None,
            client: None,
            timeout: None,
        }
    }

    /// Set the concurrency level tag
    pub fn level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    /// Set the prompt
    pub fn prompt(mut self, prompt: impl Into<Arc<str>>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the endpoint client
    pub fn client(mut self, client: Arc<dyn EndpointClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the per-request deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing or the timeout is zero.
    pub fn build(self) -> BenchResult<Worker> {
        let level = self.level.ok_or_else(|| BenchError::missing_config("level"))?;
        let prompt = self
            .prompt
            .ok_or_else(|| BenchError::missing_config("prompt"))?;
        let client = self
            .client
            .ok_or_else(|| BenchError::missing_config("client"))?;
        let timeout = self
            .timeout
            .ok_or_else(|| BenchError::missing_config("timeout"))?;

        if timeout.is_zero() {
            return Err(BenchError::config("worker timeout must be positive"));
        }

        Ok(Worker::new(self.slot, level, prompt, client, timeout))
    }
}
