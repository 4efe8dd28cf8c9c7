//! Timestamped report artifacts on disk

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokrate_core::Report;

use crate::chart::ChartPlotter;
use crate::json::JsonExporter;
use crate::summary::TextSummary;

/// Paths of the artifacts written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Text summary
    pub text: PathBuf,
    /// JSON export
    pub json: PathBuf,
    /// SVG chart, when requested
    pub chart: Option<PathBuf>,
}

/// Timestamp used in artifact file names (`20260314_093000`).
pub fn artifact_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Writes the text, JSON and chart artifacts of a report into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    with_chart: bool,
}

impl ArtifactWriter {
    /// Writer targeting `output_dir`, chart included.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            with_chart: true,
        }
    }

    /// Enable or disable the chart.
    pub fn with_chart(mut self, with_chart: bool) -> Self {
        self.with_chart = with_chart;
        self
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every artifact, stamping file names with the report's finish time.
    ///
    /// The directory is created when missing.
    pub fn write(&self, report: &Report) -> Result<ArtifactPaths> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                self.output_dir.display()
            )
        })?;

        let stamp = artifact_stamp(report.finished_at);
        let paths = ArtifactPaths {
            text: self
                .output_dir
                .join(format!("token_rate_report_{}.txt", stamp)),
            json: self
                .output_dir
                .join(format!("token_rate_report_{}.json", stamp)),
            chart: self
                .with_chart
                .then(|| self.output_dir.join(format!("token_rate_chart_{}.svg", stamp))),
        };

        fs::write(&paths.text, TextSummary::render(report))
            .with_context(|| format!("failed to write {}", paths.text.display()))?;
        JsonExporter::export(report, &paths.json)?;
        if let Some(chart) = &paths.chart {
            ChartPlotter::plot(report, chart)
                .with_context(|| format!("failed to draw {}", chart.display()))?;
        }

        tracing::info!(
            dir = %self.output_dir.display(),
            stamp = %stamp,
            chart = paths.chart.is_some(),
            "Report artifacts written"
        );
        Ok(paths)
    }
}
