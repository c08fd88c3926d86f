use anyhow::Result;
use calibration_core::{Diagnostics, EventStatEntry, ReportBundle};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// What happened during one invocation, for the operator.
pub struct RunSummary<'a> {
    pub generated_at: DateTime<Utc>,
    pub calibration_dir: &'a Path,
    pub output_dir: &'a Path,
    pub charts_written: usize,
    pub bundle: &'a ReportBundle,
}

impl RunSummary<'_> {
    fn chart_count(&self) -> usize {
        self.bundle.all_charts().count()
    }

    fn ranked(&self) -> &[EventStatEntry] {
        &self.bundle.report.events.ranked
    }
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    generated_at: String,
    calibration_dir: String,
    output_dir: String,
    n_runs: usize,
    skipped_runs: usize,
    total_observed: usize,
    total_possible: usize,
    charts: usize,
    charts_written: usize,
    ranked: &'a [EventStatEntry],
    uncatalogued: &'a [String],
    diagnostics: &'a Diagnostics,
}

pub fn generate_console_report(
    out: &mut impl Write,
    summary: &RunSummary<'_>,
    verbose: bool,
    total_duration: Duration,
) -> Result<()> {
    let events = &summary.bundle.report.events;
    writeln!(out)?;
    writeln!(out, "{}", "📊 Calibration Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "======================".cyan())?;
    for tag in &events.tags {
        writeln!(out, "{}: {}", tag.key.bold(), tag.value)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Runs: {} ({} skipped)",
        events.n_runs,
        events.skipped_runs.to_string().yellow()
    )?;
    writeln!(
        out,
        "{} out of {} events occurred at least once.",
        events.total_observed.to_string().green(),
        events.total_possible
    )?;
    writeln!(
        out,
        "Charts: {} ({} rendered)",
        summary.chart_count(),
        summary.charts_written
    )?;
    writeln!(out, "Output: {}", summary.output_dir.display())?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    if !summary.ranked().is_empty() {
        writeln!(out, "{}", "🌊 Most Common Events".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        for entry in summary.ranked() {
            writeln!(
                out,
                "{:>6.1}%  {}  {}-{} (peak {}, {} occurrences)",
                entry.percent_of_runs,
                entry.name.bold(),
                entry.min_year,
                entry.max_year,
                entry.peak_year,
                entry.total
            )?;
        }
        writeln!(out)?;
    }

    if !events.uncatalogued.is_empty() {
        writeln!(out, "{}", "Uncatalogued events:".red())?;
        for name in &events.uncatalogued {
            writeln!(out, "  • {name}")?;
        }
    }

    let diagnostics = &summary.bundle.diagnostics;
    if !diagnostics.is_empty() {
        writeln!(out, "⚠️  {} warnings", diagnostics.len().to_string().yellow())?;
        if verbose {
            for diagnostic in diagnostics {
                writeln!(out, "  • {diagnostic}")?;
            }
        }
    }
    Ok(())
}

pub fn generate_markdown_report(out: &mut impl Write, summary: &RunSummary<'_>) -> Result<()> {
    let events = &summary.bundle.report.events;
    writeln!(out, "# Calibration Report\n")?;
    writeln!(out, "_Generated {}_\n", summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;

    writeln!(out, "## Summary\n")?;
    for tag in &events.tags {
        writeln!(out, "- **{}**: {}", tag.key, tag.value)?;
    }
    writeln!(out, "- **Runs**: {}", events.n_runs)?;
    writeln!(out, "- **Skipped runs**: {}", events.skipped_runs)?;
    writeln!(
        out,
        "- **Events observed**: {} of {}",
        events.total_observed, events.total_possible
    )?;
    writeln!(
        out,
        "- **Charts**: {} ({} rendered)\n",
        summary.chart_count(),
        summary.charts_written
    )?;

    writeln!(out, "## Events\n")?;
    if summary.ranked().is_empty() {
        writeln!(out, "_No events occurred._\n")?;
    } else {
        writeln!(out, "| Event | Runs | Total | First | Last | Peak |")?;
        writeln!(out, "|---|---|---|---|---|---|")?;
        for entry in summary.ranked() {
            writeln!(
                out,
                "| {} | {:.1}% | {} | {} | {} | {} |",
                entry.name,
                entry.percent_of_runs,
                entry.total,
                entry.min_year,
                entry.max_year,
                entry.peak_year
            )?;
        }
        writeln!(out)?;
    }

    if !events.uncatalogued.is_empty() {
        writeln!(out, "## Uncatalogued Events\n")?;
        for name in &events.uncatalogued {
            writeln!(out, "- {name}")?;
        }
        writeln!(out)?;
    }

    let diagnostics = &summary.bundle.diagnostics;
    if !diagnostics.is_empty() {
        writeln!(out, "## Warnings\n")?;
        for diagnostic in diagnostics {
            writeln!(out, "- {diagnostic}")?;
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut impl Write, summary: &RunSummary<'_>) -> Result<()> {
    let events = &summary.bundle.report.events;
    let json = JsonSummary {
        generated_at: summary.generated_at.to_rfc3339(),
        calibration_dir: summary.calibration_dir.display().to_string(),
        output_dir: summary.output_dir.display().to_string(),
        n_runs: events.n_runs,
        skipped_runs: events.skipped_runs,
        total_observed: events.total_observed,
        total_possible: events.total_possible,
        charts: summary.chart_count(),
        charts_written: summary.charts_written,
        ranked: summary.ranked(),
        uncatalogued: &events.uncatalogued,
        diagnostics: &summary.bundle.diagnostics,
    };
    serde_json::to_writer_pretty(&mut *out, &json)?;
    writeln!(out)?;
    Ok(())
}
