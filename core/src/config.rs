//! Run configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Concurrency levels tested when none are configured
pub const DEFAULT_CONCURRENCY_LEVELS: [usize; 5] = [1, 2, 4, 8, 10];

/// Default completion budget per request
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default per-request deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default pause between two levels
pub const DEFAULT_LEVEL_COOLDOWN: Duration = Duration::from_secs(2);

/// Built-in prompts. Each asks for a long answer so that streams run long
/// enough for a stable rate.
pub const DEFAULT_PROMPTS: &[&str] = &[
    "Describe the history of artificial intelligence in detail, from the Turing test to the current deep learning era, covering milestones, key technical breakthroughs and future trends.",
    "Write a long article about climate change: causes of global warming, its effects, possible solutions, and the policies different countries have adopted, with scientific evidence and case studies.",
    "Explain the principles of quantum computing, its current state and prospects, and how it differs from classical computing, including qubits, entanglement and quantum algorithms.",
    "Give a comprehensive introduction to blockchain technology: how it works, where it is used, its strengths and weaknesses, and real deployments across industries.",
    "Describe the core concepts of machine learning, its algorithm families and application areas, and how a real project is carried out, covering supervised, unsupervised and reinforcement learning.",
    "Write a long article on biotechnology covering gene editing, synthetic biology and biopharmaceuticals, their latest progress, and their social and ethical implications.",
    "Explain cloud computing, its service and deployment models, and its role in enterprise digital transformation, comparing IaaS, PaaS and SaaS in detail.",
    "Write a thorough analysis of renewable energy covering solar, wind, hydro and biomass: technical characteristics, cost, current adoption and their role in the global energy transition.",
    "Describe the architecture of the Internet of Things, its applications and trends, and its place alongside big data and AI, including sensors, communication protocols and data processing.",
    "Write an in-depth analysis of the digital economy: digital transformation, digital payments, e-commerce and digital marketing, and their impact on business models.",
];

/// Immutable configuration of one benchmark run
///
/// Owned by the orchestrator for the whole run. The credential is never
/// serialized and never printed by `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Endpoint URL requests are sent to
    pub endpoint: String,

    /// Model identifier sent with each request
    pub model: String,

    /// Bearer credential
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Completion budget per request
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Hard per-request deadline
    pub timeout: Duration,

    /// Levels to test, in order
    pub concurrency_levels: Vec<usize>,

    /// Prompt set, cycled across worker slots
    pub prompts: Vec<String>,

    /// Pause inserted between two consecutive levels
    pub level_cooldown: Duration,
}

impl RunConfig {
    /// Create a config for the given endpoint and model with default settings
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
            concurrency_levels: DEFAULT_CONCURRENCY_LEVELS.to_vec(),
            prompts: DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect(),
            level_cooldown: DEFAULT_LEVEL_COOLDOWN,
        }
    }

    /// Set the credential
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the completion budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the levels to test
    pub fn with_concurrency_levels(mut self, levels: impl Into<Vec<usize>>) -> Self {
        self.concurrency_levels = levels.into();
        self
    }

    /// Replace the prompt set
    pub fn with_prompts<I, S>(mut self, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prompts = prompts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pause between levels
    pub fn with_level_cooldown(mut self, cooldown: Duration) -> Self {
        self.level_cooldown = cooldown;
        self
    }

    /// Prompt assigned to a worker slot
    ///
    /// Prompts are cycled in configured order when a level has more slots
    /// than prompts, so slot `i` always gets prompt `i mod P`.
    pub fn prompt_for(&self, slot: usize) -> &str {
        &self.prompts[slot % self.prompts.len()]
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("endpoint"));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingField("model"));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(self.timeout));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens);
        }

        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.concurrency_levels.is_empty() {
            return Err(ConfigError::InvalidConcurrency(
                "at least one concurrency level is required".into(),
            ));
        }

        if let Some(pos) = self.concurrency_levels.iter().position(|&n| n == 0) {
            return Err(ConfigError::InvalidConcurrency(format!(
                "level #{} is 0, every level must be at least 1",
                pos + 1
            )));
        }

        if self.prompts.is_empty() {
            return Err(ConfigError::InvalidPrompts("prompt set is empty".into()));
        }

        if let Some(pos) = self.prompts.iter().position(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidPrompts(format!(
                "prompt #{} is blank",
                pos + 1
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("concurrency_levels", &self.concurrency_levels)
            .field("prompts", &self.prompts.len())
            .field("level_cooldown", &self.level_cooldown)
            .finish()
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A required field is empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Timeout must be positive
    #[error("Invalid timeout: {0:?}")]
    InvalidTimeout(Duration),

    /// max_tokens must be positive
    #[error("Invalid max_tokens: must be at least 1")]
    InvalidMaxTokens,

    /// Temperature outside [0, 2]
    #[error("Invalid temperature: {0}")]
    InvalidTemperature(f32),

    /// Invalid concurrency levels
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid prompt set
    #[error("Invalid prompts: {0}")]
    InvalidPrompts(String),
}
