//! Report fixtures for tests

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokrate_core::{
    ErrorKind, LevelStats, RateSummary, Report, ReportAssembler, RunConfig, RunMetadata,
};

/// Level where `successes` of `concurrency` requests succeeded.
pub(crate) fn level(concurrency: usize, successes: usize, throughput: Option<f64>) -> LevelStats {
    let failures = concurrency - successes;
    let mut errors = BTreeMap::new();
    if failures > 0 {
        errors.insert(ErrorKind::ConnectionError, failures);
    }
    let measured = successes > 0;

    LevelStats {
        concurrency,
        attempts: concurrency,
        successes,
        timed_out: 0,
        errors,
        success_ratio: successes as f64 / concurrency as f64,
        total_tokens: 100 * successes,
        wall_clock_secs: 2.5,
        rate: measured.then_some(RateSummary {
            mean: 10.0,
            median: 10.0,
            p95: 12.5,
            min: 8.0,
            max: 13.0,
        }),
        aggregate_throughput: throughput,
        mean_ttft_ms: measured.then_some(250.0),
        mean_latency_ms: measured.then_some(2000.0),
        ttft: None,
        latency: None,
    }
}

/// Complete report over the given levels.
pub(crate) fn report(levels: Vec<LevelStats>) -> Report {
    let config = RunConfig::new("http://localhost:8000/v1/chat/completions", "qwen2-7b")
        .with_concurrency_levels(levels.iter().map(|l| l.concurrency).collect::<Vec<_>>())
        .with_timeout(Duration::from_secs(60));
    let started = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
    let metadata = RunMetadata::from_config(&config, started).with_api_type("openai");

    let mut assembler = ReportAssembler::new(metadata);
    for (position, stats) in levels.into_iter().enumerate() {
        assembler.push(position, stats).unwrap();
    }
    assembler.finish(started + chrono::Duration::seconds(42))
}

/// Report of a run cancelled after its first level.
pub(crate) fn cancelled_report() -> Report {
    let config = RunConfig::new("http://localhost:8000/v1/chat/completions", "qwen2-7b")
        .with_concurrency_levels([1, 2, 4]);
    let started = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();

    let mut assembler = ReportAssembler::new(RunMetadata::from_config(&config, started));
    assembler.push(0, level(1, 1, Some(10.0))).unwrap();
    assembler.finish(started + chrono::Duration::seconds(5))
}
