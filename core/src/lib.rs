//! tokrate-core: Core engine for measuring streaming token rates
//!
//! This crate provides the measurement engine shared by all tokrate
//! components, including:
//!
//! - Run configuration and validation
//! - The endpoint client seam (`EndpointClient`, `TokenStream`)
//! - Per-request workers and their measurement records
//! - Level orchestration, aggregation and report assembly
//! - Escalating cancellation
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod record;
pub mod report;
pub mod traits;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::{CancelHandle, CancelMode, CancelReceiver};
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use orchestrator::{aggregate_level, LevelOutcome, LevelState, Orchestrator, OrchestratorBuilder};
pub use record::*;
pub use report::*;
pub use traits::*;
pub use worker::{Worker, WorkerBuilder, WorkerOutcome};
