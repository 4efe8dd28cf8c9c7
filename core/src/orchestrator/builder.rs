//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::RunConfig;
use crate::error::{BenchError, BenchResult};
use crate::traits::EndpointClient;

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with a validated configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .config(RunConfig::new(url, "llama-3-8b").with_concurrency_levels([1, 2, 4]))
///     .client(client)
///     .build()?;
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<RunConfig>,
    client: Option<Arc<dyn EndpointClient>>,
    api_type: Option<String>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the endpoint client
    pub fn client(mut self, client: Arc<dyn EndpointClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Label the report with the endpoint's API flavour
    pub fn api_type(mut self, api_type: impl Into<String>) -> Self {
        self.api_type = Some(api_type.into());
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the config or client is not set, or if
    /// configuration validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let config = self
            .config
            .ok_or_else(|| BenchError::missing_config("config"))?;

        let client = self
            .client
            .ok_or_else(|| BenchError::missing_config("client"))?;

        config
            .validate()
            .map_err(|e| BenchError::config(e.to_string()))?;

        let mut orchestrator = Orchestrator::new(config, client);
        orchestrator.api_type = self.api_type;

        Ok(orchestrator)
    }
}
