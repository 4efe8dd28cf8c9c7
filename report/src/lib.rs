//! Report rendering for tokrate runs
//!
//! A finished [`tokrate_core::Report`] is rendered three ways:
//!
//! - a plain-text summary ([`TextSummary`])
//! - a JSON document with the derived analysis ([`JsonExporter`])
//! - a four-panel SVG chart ([`ChartPlotter`])
//!
//! [`ArtifactWriter`] writes all of them into one directory under a shared
//! timestamp.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod chart;
pub mod json;
pub mod summary;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use analysis::{scaling_efficiency, BestLevel, ReportAnalysis, ScalingPoint, Totals};
pub use chart::ChartPlotter;
pub use json::JsonExporter;
pub use summary::TextSummary;
pub use writer::{artifact_stamp, ArtifactPaths, ArtifactWriter};
