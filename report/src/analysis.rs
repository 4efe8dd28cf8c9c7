//! Cross-level analysis of a report

use serde::Serialize;
use tokrate_core::Report;

/// Totals over every measured level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    /// Requests attempted
    pub requests: usize,
    /// Requests that completed
    pub successes: usize,
    /// Requests that failed or timed out
    pub failures: usize,
    /// Tokens delivered by successful requests
    pub tokens: usize,
}

impl Totals {
    /// Success rate in percent, absent when nothing was attempted.
    pub fn success_rate_percent(&self) -> Option<f64> {
        (self.requests > 0).then(|| self.successes as f64 / self.requests as f64 * 100.0)
    }
}

/// Level with the highest aggregate throughput.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestLevel {
    /// Concurrency of the level
    pub concurrency: usize,
    /// Its aggregate throughput (tokens/sec)
    pub throughput: f64,
}

/// Scaling efficiency of one level against the baseline level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalingPoint {
    /// Concurrency of the level
    pub concurrency: usize,
    /// `throughput(c) / (throughput(c0) * c / c0)`, absent without both throughputs
    pub efficiency: Option<f64>,
}

/// Derived figures printed under the per-level table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportAnalysis {
    /// Totals over all levels
    pub totals: Totals,
    /// Best level by aggregate throughput
    pub best: Option<BestLevel>,
    /// Concurrency of the first measured level
    pub baseline: Option<usize>,
    /// Efficiency of every level after the baseline, in report order
    pub scaling: Vec<ScalingPoint>,
}

impl ReportAnalysis {
    /// Analyse a report.
    pub fn from_report(report: &Report) -> Self {
        let totals = report.levels.iter().fold(
            Totals {
                requests: 0,
                successes: 0,
                failures: 0,
                tokens: 0,
            },
            |acc, level| Totals {
                requests: acc.requests + level.attempts,
                successes: acc.successes + level.successes,
                failures: acc.failures + level.failures(),
                tokens: acc.tokens + level.total_tokens,
            },
        );

        // First maximum wins on ties
        let best = report
            .levels
            .iter()
            .filter_map(|level| {
                level.aggregate_throughput.map(|throughput| BestLevel {
                    concurrency: level.concurrency,
                    throughput,
                })
            })
            .fold(None, |best: Option<BestLevel>, candidate| match best {
                Some(b) if b.throughput >= candidate.throughput => Some(b),
                _ => Some(candidate),
            });

        let (baseline, scaling) = match report.levels.split_first() {
            Some((first, rest)) => {
                let scaling = rest
                    .iter()
                    .map(|level| ScalingPoint {
                        concurrency: level.concurrency,
                        efficiency: scaling_efficiency(
                            first.concurrency,
                            first.aggregate_throughput,
                            level.concurrency,
                            level.aggregate_throughput,
                        ),
                    })
                    .collect();
                (Some(first.concurrency), scaling)
            }
            None => (None, Vec::new()),
        };

        Self {
            totals,
            best,
            baseline,
            scaling,
        }
    }
}

/// Measured throughput relative to perfect linear scaling from the baseline.
pub fn scaling_efficiency(
    baseline_concurrency: usize,
    baseline_throughput: Option<f64>,
    concurrency: usize,
    throughput: Option<f64>,
) -> Option<f64> {
    let base = baseline_throughput?;
    let actual = throughput?;
    let expected = base * concurrency as f64 / baseline_concurrency as f64;
    (expected > 0.0).then(|| actual / expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{level, report};

    #[test]
    fn test_totals_and_success_rate() {
        let report = report(vec![level(1, 1, Some(10.0)), level(4, 3, Some(30.0))]);

        let analysis = ReportAnalysis::from_report(&report);

        assert_eq!(analysis.totals.requests, 5);
        assert_eq!(analysis.totals.successes, 4);
        assert_eq!(analysis.totals.failures, 1);
        assert_eq!(analysis.totals.success_rate_percent(), Some(80.0));
    }

    #[test]
    fn test_best_level_skips_absent_throughput() {
        let report = report(vec![
            level(1, 1, Some(10.0)),
            level(2, 0, None),
            level(4, 4, Some(36.0)),
            level(8, 8, Some(36.0)),
        ]);

        let best = ReportAnalysis::from_report(&report).best.unwrap();
        assert_eq!(best.concurrency, 4);
        assert_eq!(best.throughput, 36.0);
    }

    #[test]
    fn test_scaling_against_first_level() {
        let report = report(vec![
            level(1, 1, Some(10.0)),
            level(2, 2, Some(18.0)),
            level(4, 0, None),
        ]);

        let analysis = ReportAnalysis::from_report(&report);

        assert_eq!(analysis.baseline, Some(1));
        assert_eq!(analysis.scaling.len(), 2);
        assert!((analysis.scaling[0].efficiency.unwrap() - 0.9).abs() < 1e-9);
        assert_eq!(analysis.scaling[1].efficiency, None);
    }

    #[test]
    fn test_scaling_with_non_unit_baseline() {
        // 2 -> 8 at 50 tok/s -> 150 tok/s: expected 200, efficiency 0.75
        assert_eq!(scaling_efficiency(2, Some(50.0), 8, Some(150.0)), Some(0.75));
        assert_eq!(scaling_efficiency(2, None, 8, Some(150.0)), None);
        assert_eq!(scaling_efficiency(2, Some(0.0), 8, Some(150.0)), None);
    }

    #[test]
    fn test_empty_report() {
        let analysis = ReportAnalysis::from_report(&report(Vec::new()));

        assert_eq!(analysis.totals.success_rate_percent(), None);
        assert!(analysis.best.is_none());
        assert!(analysis.baseline.is_none());
        assert!(analysis.scaling.is_empty());
    }
}
