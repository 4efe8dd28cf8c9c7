//! JSON export functionality

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tokrate_core::Report;

use crate::analysis::ReportAnalysis;

/// Serialized document: the report plus its derived analysis.
#[derive(Serialize)]
struct JsonDocument<'a> {
    #[serde(flatten)]
    report: &'a Report,
    analysis: ReportAnalysis,
}

/// Exports reports as pretty-printed JSON.
pub struct JsonExporter;

impl JsonExporter {
    /// Render the report as a JSON string.
    pub fn to_string(report: &Report) -> Result<String> {
        let document = JsonDocument {
            report,
            analysis: ReportAnalysis::from_report(report),
        };
        serde_json::to_string_pretty(&document).context("failed to serialize report")
    }

    /// Export the report to a JSON file.
    pub fn export(report: &Report, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let document = JsonDocument {
            report,
            analysis: ReportAnalysis::from_report(report),
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &document)
            .with_context(|| format!("failed to write {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cancelled_report, level, report};

    #[test]
    fn test_report_fields_are_top_level() {
        let report = report(vec![level(1, 1, Some(10.0)), level(2, 1, Some(12.0))]);

        let json: serde_json::Value =
            serde_json::from_str(&JsonExporter::to_string(&report).unwrap()).unwrap();

        assert_eq!(json["metadata"]["model"], "qwen2-7b");
        assert_eq!(json["levels"].as_array().unwrap().len(), 2);
        assert_eq!(json["levels"][1]["concurrency"], 2);
        assert_eq!(json["levels"][1]["errors"]["connection_error"], 1);
        assert_eq!(json["completion"]["state"], "complete");
        assert_eq!(json["analysis"]["best"]["concurrency"], 2);
        assert_eq!(json["analysis"]["totals"]["requests"], 3);
    }

    #[test]
    fn test_absent_statistics_are_omitted() {
        let report = report(vec![level(2, 0, None)]);

        let json: serde_json::Value =
            serde_json::from_str(&JsonExporter::to_string(&report).unwrap()).unwrap();

        let level = &json["levels"][0];
        assert!(level.get("aggregate_throughput").is_none());
        assert!(level.get("rate").is_none());
        assert_eq!(level["success_ratio"], 0.0);
        assert!(json["analysis"]["best"].is_null());
    }

    #[test]
    fn test_export_round_trips_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = cancelled_report();

        JsonExporter::export(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Report = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
        assert!(text.contains("\"skipped_levels\""));
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");

        let err = JsonExporter::export(&report(Vec::new()), &path).unwrap_err();
        assert!(err.to_string().contains("failed to create"));
    }
}
