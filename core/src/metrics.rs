//! Level statistics and percentile calculation

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics of one concurrency level
///
/// Every rate or latency field is `None` when the level has no successful
/// request. A zero would read as a measured throughput of nothing.
/// Rates are also `None` when the measured span is zero, so a level can
/// report successes without a rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Concurrency level
    pub concurrency: usize,

    /// Requests attempted (always equal to `concurrency`)
    pub attempts: usize,
    /// Requests that completed
    pub successes: usize,
    /// Requests that hit their deadline
    pub timed_out: usize,
    /// Failed requests per error kind (timeouts included)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<ErrorKind, usize>,
    /// `successes / attempts`
    pub success_ratio: f64,

    /// Tokens delivered by successful requests
    pub total_tokens: usize,
    /// Latest end minus earliest start across all records (seconds)
    pub wall_clock_secs: f64,

    /// Per-request token rate summary (tokens/sec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<RateSummary>,
    /// Successful tokens divided by the level's wall-clock span (tokens/sec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_throughput: Option<f64>,

    /// Mean time to first token (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_ttft_ms: Option<f64>,
    /// Mean end-to-end latency (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_latency_ms: Option<f64>,

    /// Time to first token percentiles (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttft: Option<LatencyPercentiles>,
    /// End-to-end latency percentiles (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyPercentiles>,
}

impl LevelStats {
    /// Requests that did not succeed
    pub fn failures(&self) -> usize {
        self.attempts - self.successes
    }

    /// Failed requests of one kind
    pub fn errors_of(&self, kind: ErrorKind) -> usize {
        self.errors.get(&kind).copied().unwrap_or(0)
    }
}

/// Per-request token rate summary (tokens/sec)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    /// Mean rate
    pub mean: f64,
    /// Median rate
    pub median: f64,
    /// 95th percentile rate
    pub p95: f64,
    /// Slowest request
    pub min: f64,
    /// Fastest request
    pub max: f64,
}

impl RateSummary {
    /// Summarize a set of rates, `None` when empty
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sorted = sorted(values);
        Some(Self {
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Latency percentiles (all values in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LatencyPercentiles {
    /// Minimum value
    pub min: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Standard deviation
    pub stddev: f64,
}

impl LatencyPercentiles {
    /// Calculate percentiles from a slice of values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let sorted = sorted(values);
        let len = sorted.len();
        let mean = sorted.iter().sum::<f64>() / len as f64;

        let variance = if len > 1 {
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (len - 1) as f64
        } else {
            0.0
        };

        Self {
            min: sorted[0],
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
            p90: percentile(&sorted, 0.90),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            max: sorted[len - 1],
            mean,
            stddev: variance.sqrt(),
        }
    }

    /// Like `from_values`, but `None` for an empty slice
    pub fn non_empty(values: &[f64]) -> Option<Self> {
        (!values.is_empty()).then(|| Self::from_values(values))
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Calculate percentile from sorted values using linear interpolation
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
