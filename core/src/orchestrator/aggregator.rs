//! Level aggregation
//!
//! Pure reduction of one level's records into [`LevelStats`]. Aggregating the
//! same records twice yields identical stats.

use std::collections::BTreeMap;

use crate::metrics::{mean, LatencyPercentiles, LevelStats, RateSummary};
use crate::record::{RequestRecord, RequestStatus};

/// Reduce the records of one level into its statistics
///
/// Rates and latencies use successful records only. Failed and timed-out
/// records still count towards `attempts`. The wall-clock span runs from the
/// earliest start to the latest end across every record, so aggregate
/// throughput reflects the overlap of concurrent requests.
pub fn aggregate_level(concurrency: usize, records: &[RequestRecord]) -> LevelStats {
    let attempts = records.len();
    let successful: Vec<&RequestRecord> = records.iter().filter(|r| r.status.is_success()).collect();
    let successes = successful.len();

    let mut errors = BTreeMap::new();
    let mut timed_out = 0;
    for record in records {
        if let Some(kind) = record.status.error_kind() {
            *errors.entry(kind).or_insert(0) += 1;
        }
        if record.status == RequestStatus::TimedOut {
            timed_out += 1;
        }
    }

    let wall_clock_secs = match (
        records.iter().map(|r| r.started_at).min(),
        records.iter().map(|r| r.ended_at).max(),
    ) {
        (Some(first), Some(last)) => last.duration_since(first).as_secs_f64(),
        _ => 0.0,
    };

    let total_tokens: usize = successful.iter().map(|r| r.total_tokens).sum();

    let rates: Vec<f64> = successful.iter().filter_map(|r| r.token_rate()).collect();
    let latencies_ms: Vec<f64> = successful
        .iter()
        .map(|r| r.duration().as_secs_f64() * 1000.0)
        .collect();
    let ttfts_ms: Vec<f64> = successful
        .iter()
        .filter_map(|r| r.time_to_first_token())
        .map(|d| d.as_secs_f64() * 1000.0)
        .collect();

    let aggregate_throughput =
        (successes > 0 && wall_clock_secs > 0.0).then(|| total_tokens as f64 / wall_clock_secs);

    let success_ratio = if attempts > 0 {
        successes as f64 / attempts as f64
    } else {
        0.0
    };

    LevelStats {
        concurrency,
        attempts,
        successes,
        timed_out,
        errors,
        success_ratio,
        total_tokens,
        wall_clock_secs,
        rate: RateSummary::from_values(&rates),
        aggregate_throughput,
        mean_ttft_ms: mean(&ttfts_ms),
        mean_latency_ms: mean(&latencies_ms),
        ttft: LatencyPercentiles::non_empty(&ttfts_ms),
        latency: LatencyPercentiles::non_empty(&latencies_ms),
    }
}
