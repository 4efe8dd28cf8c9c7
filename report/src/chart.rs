//! Four-panel SVG chart of a report

use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use tokrate_core::Report;

type Panel<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Draws throughput, tokens, latency and success rate against concurrency.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Plot the report into an SVG file.
    pub fn plot(report: &Report, path: &Path) -> Result<()> {
        let root = SVGBackend::new(path, (1500, 1200)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(
            &format!("Token Rate Report - {}", report.metadata.model),
            ("sans-serif", 32),
        )?;

        let levels = &report.levels;
        let throughput: Vec<(f64, f64)> = levels
            .iter()
            .filter_map(|l| l.aggregate_throughput.map(|t| (l.concurrency as f64, t)))
            .collect();
        let tokens: Vec<(f64, f64)> = levels
            .iter()
            .map(|l| (l.concurrency as f64, l.total_tokens as f64))
            .collect();
        let latency: Vec<(f64, f64)> = levels
            .iter()
            .filter_map(|l| l.mean_latency_ms.map(|ms| (l.concurrency as f64, ms / 1000.0)))
            .collect();
        let success: Vec<(f64, f64)> = levels
            .iter()
            .map(|l| (l.concurrency as f64, l.success_ratio * 100.0))
            .collect();

        let x_max = levels
            .iter()
            .map(|l| l.concurrency as f64)
            .fold(1.0, f64::max);
        let x_range = 0.0..(x_max * 1.1).max(x_max + 1.0);

        let panels = root.split_evenly((2, 2));
        let [throughput_area, tokens_area, latency_area, success_area] = panels.as_slice() else {
            return Err(anyhow!("chart layout produced {} panels", panels.len()));
        };

        line_panel(
            throughput_area,
            "Aggregate throughput vs concurrency",
            "Tokens/s",
            x_range.clone(),
            &throughput,
            &BLUE,
        )?;
        bar_panel(
            tokens_area,
            "Total tokens vs concurrency",
            "Tokens",
            x_range.clone(),
            &tokens,
            None,
            &CYAN,
        )?;
        line_panel(
            latency_area,
            "Mean latency vs concurrency",
            "Seconds",
            x_range.clone(),
            &latency,
            &RED,
        )?;
        bar_panel(
            success_area,
            "Success rate vs concurrency",
            "Success (%)",
            x_range,
            &success,
            Some(100.0),
            &GREEN,
        )?;

        root.present()?;
        tracing::debug!(path = %path.display(), levels = levels.len(), "Chart written");
        Ok(())
    }
}

fn y_upper(points: &[(f64, f64)]) -> f64 {
    let max = points.iter().map(|&(_, y)| y).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.15
    } else {
        1.0
    }
}

fn line_panel(
    area: &Panel<'_>,
    title: &str,
    y_desc: &str,
    x_range: std::ops::Range<f64>,
    points: &[(f64, f64)],
    color: &RGBColor,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, 0.0..y_upper(points))?;

    chart
        .configure_mesh()
        .x_desc("Concurrency")
        .y_desc(y_desc)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .y_label_formatter(&|y| format!("{:.1}", y))
        .draw()?;

    chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&point| Circle::new(point, 5, color.filled())),
    )?;

    Ok(())
}

fn bar_panel(
    area: &Panel<'_>,
    title: &str,
    y_desc: &str,
    x_range: std::ops::Range<f64>,
    points: &[(f64, f64)],
    y_max: Option<f64>,
    color: &RGBColor,
) -> Result<()> {
    let half_width = bar_half_width(points);
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, 0.0..y_max.unwrap_or_else(|| y_upper(points)))?;

    chart
        .configure_mesh()
        .x_desc("Concurrency")
        .y_desc(y_desc)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .draw()?;

    chart.draw_series(points.iter().map(|&(x, y)| {
        Rectangle::new(
            [(x - half_width, 0.0), (x + half_width, y)],
            color.mix(0.7).filled(),
        )
    }))?;

    Ok(())
}

/// Bars take a third of the smallest gap between neighbouring levels.
fn bar_half_width(points: &[(f64, f64)]) -> f64 {
    let mut xs: Vec<f64> = points.iter().map(|&(x, _)| x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    let min_gap = xs
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if min_gap.is_finite() {
        (min_gap / 3.0).min(1.0)
    } else {
        0.3
    }
}
