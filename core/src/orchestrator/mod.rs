//! Orchestrator for run lifecycle management
//!
//! The Orchestrator coordinates a complete token rate run:
//! - Runs the configured concurrency levels strictly in sequence
//! - Releases the N workers of a level together and waits for all of them
//! - Tracks each level through `Pending → Running → Drained → Aggregated`
//! - Aggregates each drained level and assembles the ordered report
//! - Honours cancellation between levels or mid-level
//!
//! # Example
//!
//! ```ignore
//! use tokrate_core::{OrchestratorBuilder, RunConfig};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(RunConfig::new(url, "qwen2-7b").with_concurrency_levels([1, 2, 4, 8]))
//!     .client(client)
//!     .build()?;
//!
//! let report = orchestrator.run_with_signal_handling().await?;
//! ```

mod aggregator;
mod builder;
mod executor;
mod state;

pub use aggregator::aggregate_level;
pub use builder::OrchestratorBuilder;
pub use executor::{LevelOutcome, Orchestrator};
pub use state::LevelState;
