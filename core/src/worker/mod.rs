//! Worker module for executing measured requests
//!
//! A Worker owns exactly one request lifecycle:
//!
//! 1. Opens a streaming request through an [`EndpointClient`](crate::traits::EndpointClient)
//! 2. Records every token arrival exactly as received
//! 3. Stops at completion, error, or its hard deadline
//! 4. Returns one sealed [`RequestRecord`](crate::record::RequestRecord)
//!
//! Request failures become a terminal status in the record rather than an
//! error, which is what isolates a failing request from its siblings. The
//! only way a worker returns without a record is when the run is abandoned.
//!
//! # Example
//!
//! ```ignore
//! use tokrate_core::worker::{WorkerBuilder, WorkerOutcome};
//!
//! let worker = WorkerBuilder::new(0)
//!     .level(1)
//!     .prompt("Describe the history of the transistor")
//!     .client(client)
//!     .timeout(Duration::from_secs(60))
//!     .build()?;
//!
//! if let WorkerOutcome::Finished(record) = worker.run(cancel.subscribe()).await {
//!     println!("{} tokens in {:?}", record.total_tokens, record.duration());
//! }
//! ```

mod builder;
mod executor;

pub use builder::WorkerBuilder;
pub use executor::{Worker, WorkerOutcome};

#[cfg(test)]
mod tests;
