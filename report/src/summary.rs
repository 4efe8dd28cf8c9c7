//! Plain-text report summary

use tokrate_core::{LevelStats, Report, RunCompletion};

use crate::analysis::ReportAnalysis;

const RULE_WIDTH: usize = 92;

/// Renders a report as the text summary printed to the console and saved
/// next to the other artifacts.
pub struct TextSummary;

impl TextSummary {
    /// Render the full summary.
    pub fn render(report: &Report) -> String {
        let analysis = ReportAnalysis::from_report(report);
        let meta = &report.metadata;
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let mut lines: Vec<String> = Vec::new();

        lines.push(heavy.clone());
        lines.push("Token Rate Test Report".to_string());
        lines.push(heavy.clone());
        lines.push(format!(
            "Run started:   {}",
            meta.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        lines.push(format!("Endpoint:      {}", meta.endpoint));
        lines.push(format!("Model:         {}", meta.model));
        if let Some(api_type) = &meta.api_type {
            lines.push(format!("API type:      {}", api_type));
        }
        lines.push(format!("Max tokens:    {}", meta.max_tokens));
        lines.push(format!("Temperature:   {}", meta.temperature));
        lines.push(format!("Timeout:       {:.1}s", meta.timeout_secs));
        lines.push(String::new());

        let totals = analysis.totals;
        lines.push("Overall:".to_string());
        lines.push(format!("  Total requests:      {}", totals.requests));
        lines.push(format!("  Successful requests: {}", totals.successes));
        lines.push(format!("  Failed requests:     {}", totals.failures));
        lines.push(format!(
            "  Success rate:        {}",
            percent(totals.success_rate_percent(), 2)
        ));
        lines.push(format!("  Tokens received:     {}", totals.tokens));
        lines.push(String::new());

        lines.push("Per-level results:".to_string());
        lines.push(light.clone());
        lines.push(format!(
            "{:<8} {:<12} {:<10} {:<10} {:<10} {:<12} {:<10} {:<14}",
            "Conc.", "Tok/s", "Tokens", "Span(s)", "Success", "Latency(s)", "TTFT(s)", "p95 req tok/s"
        ));
        lines.push(light.clone());
        if report.levels.is_empty() {
            lines.push("No levels were measured.".to_string());
        }
        lines.extend(report.levels.iter().map(level_row));
        lines.push(light);
        lines.push(String::new());

        lines.push("Analysis:".to_string());
        lines.push(match analysis.best {
            Some(best) => format!(
                "  Best concurrency: {} ({:.2} tok/s)",
                best.concurrency, best.throughput
            ),
            None => "  Best concurrency: n/a".to_string(),
        });
        if let (Some(baseline), false) = (analysis.baseline, analysis.scaling.is_empty()) {
            lines.push(format!("  Scaling efficiency (vs concurrency {}):", baseline));
            lines.extend(analysis.scaling.iter().map(|point| {
                format!(
                    "    concurrency {}: {}",
                    point.concurrency,
                    percent(point.efficiency.map(|e| e * 100.0), 1)
                )
            }));
        }

        if let RunCompletion::Cancelled { skipped_levels } = &report.completion {
            let skipped: Vec<String> = skipped_levels.iter().map(|l| l.to_string()).collect();
            lines.push(String::new());
            lines.push(format!(
                "Run cancelled; levels not measured: {}",
                skipped.join(", ")
            ));
        }

        lines.push(String::new());
        lines.push(heavy);
        lines.join("\n")
    }
}

fn level_row(level: &LevelStats) -> String {
    format!(
        "{:<8} {:<12} {:<10} {:<10.2} {:<10} {:<12} {:<10} {:<14}",
        level.concurrency,
        number(level.aggregate_throughput, 2),
        level.total_tokens,
        level.wall_clock_secs,
        percent(Some(level.success_ratio * 100.0), 2),
        number(level.mean_latency_ms.map(|ms| ms / 1000.0), 2),
        number(level.mean_ttft_ms.map(|ms| ms / 1000.0), 3),
        number(level.rate.map(|r| r.p95), 2),
    )
}

fn number(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}

fn percent(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}%", precision, v),
        None => "n/a".to_string(),
    }
}
