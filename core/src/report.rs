//! Cross-level report assembly

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{BenchError, BenchResult};
use crate::metrics::LevelStats;

/// Descriptive metadata of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Model identifier
    pub model: String,
    /// Endpoint URL
    pub endpoint: String,
    /// API flavour, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
    /// Completion budget per request
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request deadline (seconds)
    pub timeout_secs: f64,
    /// Levels requested, in order
    pub concurrency_levels: Vec<usize>,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl RunMetadata {
    /// Capture metadata from a run configuration
    pub fn from_config(config: &RunConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            api_type: None,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout.as_secs_f64(),
            concurrency_levels: config.concurrency_levels.clone(),
            started_at,
        }
    }

    /// Attach an API flavour label
    pub fn with_api_type(mut self, api_type: impl Into<String>) -> Self {
        self.api_type = Some(api_type.into());
        self
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunCompletion {
    /// Every configured level was measured
    Complete,
    /// The run was cancelled before all levels were measured
    Cancelled {
        /// Levels with no statistics, in configured order
        skipped_levels: Vec<usize>,
    },
}

/// Result of a run: per-level statistics in configured order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Run metadata
    pub metadata: RunMetadata,
    /// One entry per measured level, in configured order
    pub levels: Vec<LevelStats>,
    /// Completion state
    pub completion: RunCompletion,
    /// When the report was assembled
    pub finished_at: DateTime<Utc>,
}

impl Report {
    /// Whether every configured level was measured
    pub fn is_complete(&self) -> bool {
        self.completion == RunCompletion::Complete
    }

    /// Statistics of one concurrency level
    pub fn level(&self, concurrency: usize) -> Option<&LevelStats> {
        self.levels.iter().find(|l| l.concurrency == concurrency)
    }
}

/// Collects level statistics and orders them by configured position
///
/// Positions, not concurrency values, identify levels, so a level list with
/// repeats (`[1, 4, 1]`) is still reported faithfully.
#[derive(Debug)]
pub struct ReportAssembler {
    metadata: RunMetadata,
    configured: Vec<usize>,
    slots: Vec<Option<LevelStats>>,
}

impl ReportAssembler {
    /// Start assembling for the configured levels
    pub fn new(metadata: RunMetadata) -> Self {
        let configured = metadata.concurrency_levels.clone();
        let slots = configured.iter().map(|_| None).collect();
        Self {
            metadata,
            configured,
            slots,
        }
    }

    /// Store the statistics of the level at configured `position`
    ///
    /// # Errors
    /// Rejects an unknown or already filled position, or stats whose
    /// concurrency disagrees with the configured level.
    pub fn push(&mut self, position: usize, stats: LevelStats) -> BenchResult<()> {
        let expected = *self.configured.get(position).ok_or_else(|| {
            BenchError::orchestration(format!(
                "level position {} is outside the {} configured levels",
                position,
                self.configured.len()
            ))
        })?;

        if stats.concurrency != expected {
            return Err(BenchError::orchestration(format!(
                "level position {} is configured for concurrency {}, got {}",
                position, expected, stats.concurrency
            )));
        }

        let slot = &mut self.slots[position];
        if slot.is_some() {
            return Err(BenchError::orchestration(format!(
                "level position {} was already reported",
                position
            )));
        }
        *slot = Some(stats);
        Ok(())
    }

    /// Number of levels stored so far
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Package the stored levels into a report
    ///
    /// Missing positions mark the run as cancelled.
    pub fn finish(self, finished_at: DateTime<Utc>) -> Report {
        let skipped_levels: Vec<usize> = self
            .configured
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(level, _)| *level)
            .collect();

        let completion = if skipped_levels.is_empty() {
            RunCompletion::Complete
        } else {
            RunCompletion::Cancelled { skipped_levels }
        };

        Report {
            metadata: self.metadata,
            levels: self.slots.into_iter().flatten().collect(),
            completion,
            finished_at,
        }
    }
}
