//! Orchestrator execution logic

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::cancel::CancelHandle;
use crate::config::RunConfig;
use crate::error::{BenchError, BenchResult};
use crate::metrics::LevelStats;
use crate::record::RequestRecord;
use crate::report::{Report, ReportAssembler, RunMetadata};
use crate::traits::EndpointClient;
use crate::worker::{WorkerBuilder, WorkerOutcome};

use super::aggregator::aggregate_level;
use super::state::LevelState;

/// Result of running one concurrency level
#[derive(Debug)]
pub enum LevelOutcome {
    /// All N workers reached a terminal status; records are in slot order
    Drained(Vec<RequestRecord>),
    /// The run was abandoned while the level was in flight
    Abandoned {
        /// Workers that finished before abandonment
        finished: usize,
        /// Workers launched
        total: usize,
    },
}

/// Orchestrator runs the configured levels against one endpoint
///
/// Levels run strictly one after another. Within a level all workers are
/// released together and the level is only aggregated once every worker is
/// terminal.
pub struct Orchestrator {
    /// Run configuration
    pub(crate) config: Arc<RunConfig>,

    /// Endpoint client (shared across workers)
    pub(crate) client: Arc<dyn EndpointClient>,

    /// Cancellation entry point
    pub(crate) cancel: CancelHandle,

    /// Label recorded in report metadata
    pub(crate) api_type: Option<String>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for validated construction.
    pub fn new(config: RunConfig, client: Arc<dyn EndpointClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
            cancel: CancelHandle::new(),
            api_type: None,
        }
    }

    /// Cancellation handle for this run
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one concurrency level to completion
    ///
    /// Launches exactly `concurrency` workers and waits for all of them.
    /// Prompts are assigned by slot, cycling through the configured set.
    pub async fn run_level(&self, concurrency: usize) -> BenchResult<LevelOutcome> {
        let mut state = LevelState::default();
        self.run_level_tracked(concurrency, &mut state).await
    }

    async fn run_level_tracked(
        &self,
        concurrency: usize,
        state: &mut LevelState,
    ) -> BenchResult<LevelOutcome> {
        if self.config.prompts.is_empty() {
            return Err(BenchError::config("prompt set is empty"));
        }
        state.start(concurrency)?;
        let level_started = Instant::now();
        let barrier = Arc::new(Barrier::new(concurrency));
        let mut prompts = Vec::with_capacity(concurrency);
        let mut join_set = JoinSet::new();

        for slot in 0..concurrency {
            let prompt: Arc<str> = Arc::from(self.config.prompt_for(slot));
            prompts.push(Arc::clone(&prompt));

            let worker = WorkerBuilder::new(slot)
                .level(concurrency)
                .prompt(prompt)
                .client(Arc::clone(&self.client))
                .timeout(self.config.timeout)
                .build()?;
            let cancel = self.cancel.subscribe();
            let barrier = Arc::clone(&barrier);

            join_set.spawn(async move {
                barrier.wait().await;
                (slot, worker.run(cancel).await)
            });
        }

        let mut slots: Vec<Option<RequestRecord>> = (0..concurrency).map(|_| None).collect();
        let mut abandoned = 0;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, WorkerOutcome::Finished(record))) => {
                    slots[slot] = Some(record);
                }
                Ok((_, WorkerOutcome::Abandoned)) => {
                    abandoned += 1;
                }
                Err(e) => {
                    // The slot is recovered below from the empty entry
                    tracing::error!(level = concurrency, error = %e, "Worker task panicked");
                }
            }

            state.record_terminal()?;
            if let Some((terminal, total)) = state.progress() {
                tracing::debug!(level = concurrency, terminal, total, "Worker terminal");
            }
        }

        if !state.is_drained() {
            return Err(BenchError::orchestration(format!(
                "level {} ended in state {:?}",
                concurrency, state
            )));
        }

        if abandoned > 0 {
            let finished = slots.iter().filter(|s| s.is_some()).count();
            return Ok(LevelOutcome::Abandoned {
                finished,
                total: concurrency,
            });
        }

        let now = Instant::now();
        let records = slots
            .into_iter()
            .zip(prompts)
            .enumerate()
            .map(|(slot, (record, prompt))| {
                record.unwrap_or_else(|| {
                    RequestRecord::worker_lost(
                        concurrency,
                        slot,
                        prompt,
                        level_started,
                        now,
                        "worker task failed",
                    )
                })
            })
            .collect();

        Ok(LevelOutcome::Drained(records))
    }

    /// Run every configured level and assemble the report
    ///
    /// Returns a partial report when cancelled. Only setup faults are errors.
    pub async fn run(&self) -> BenchResult<Report> {
        let started = Instant::now();
        let mut metadata = RunMetadata::from_config(&self.config, Utc::now());
        if let Some(api_type) = &self.api_type {
            metadata = metadata.with_api_type(api_type.clone());
        }
        let mut assembler = ReportAssembler::new(metadata);
        let mut cancel = self.cancel.subscribe();

        tracing::info!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            levels = ?self.config.concurrency_levels,
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Starting token rate run"
        );

        for (position, &concurrency) in self.config.concurrency_levels.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(concurrency, "Cancellation requested, skipping remaining levels");
                break;
            }

            if position > 0 && !self.config.level_cooldown.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Cancellation requested during cooldown");
                        break;
                    }
                    _ = tokio::time::sleep(self.config.level_cooldown) => {}
                }
            }

            tracing::info!(concurrency, position, "Starting level");

            let mut state = LevelState::default();
            match self.run_level_tracked(concurrency, &mut state).await? {
                LevelOutcome::Drained(records) => {
                    let stats = self.finish_level(concurrency, &records, &mut state)?;
                    assembler.push(position, stats)?;
                }
                LevelOutcome::Abandoned { finished, total } => {
                    tracing::warn!(
                        concurrency,
                        finished,
                        total,
                        "Level abandoned, excluding it from the report"
                    );
                    break;
                }
            }
        }

        let report = assembler.finish(Utc::now());
        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            levels = report.levels.len(),
            complete = report.is_complete(),
            "Run finished"
        );

        Ok(report)
    }

    fn finish_level(
        &self,
        concurrency: usize,
        records: &[RequestRecord],
        state: &mut LevelState,
    ) -> BenchResult<LevelStats> {
        if records.len() != concurrency {
            return Err(BenchError::orchestration(format!(
                "level {} produced {} records",
                concurrency,
                records.len()
            )));
        }

        state.aggregate()?;
        let stats = aggregate_level(concurrency, records);

        tracing::info!(
            concurrency,
            successes = stats.successes,
            attempts = stats.attempts,
            total_tokens = stats.total_tokens,
            throughput = ?stats.aggregate_throughput,
            "Level completed"
        );

        Ok(stats)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// The first Ctrl+C stops after the current level. A second one abandons
    /// the requests in flight.
    pub async fn run_with_signal_handling(&self) -> BenchResult<Report> {
        let cancel = self.cancel.clone();

        let signal_handle = tokio::spawn(async move {
            if !wait_for_ctrl_c().await {
                return;
            }
            tracing::warn!("Received Ctrl+C, finishing current level (press again to abort)");
            cancel.stop_after_level();

            if !wait_for_ctrl_c().await {
                return;
            }
            tracing::warn!("Received second Ctrl+C, abandoning in-flight requests");
            cancel.abandon();
        });

        let result = self.run().await;

        signal_handle.abort();

        result
    }
}

async fn wait_for_ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            false
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("endpoint", &self.client.endpoint())
            .field("cancel", &self.cancel.mode())
            .finish()
    }
}
