//! Serializable report models handed to the page templates.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::charts::{ChartSpec, YearWindow, file_stem};
use crate::config::REPORT_WINDOW_YEARS;
use crate::distribution::{EnsembleStats, EventDistribution};
use crate::model::{
    RunMetadata, RunRecord, TimeSeriesDataset, YearEvents, YearSnapshot, year_at,
};
use crate::render::chart_file_name;
use crate::series::{ChartGroupSpec, icon_event_lines};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRef {
    pub title: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartGroupRef {
    pub name: String,
    pub charts: Vec<ChartRef>,
}

/// One row of the narrative sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearEntry {
    pub year: i32,
    pub events: Vec<String>,
    pub icon_events: Vec<String>,
    /// No narrative events this year.
    pub quiet: bool,
}

/// Main calibration page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub tags: Vec<Tag>,
    pub window: YearWindow,
    pub rows: usize,
    pub groups: Vec<ChartGroupRef>,
    /// Tooltip text for the year-scrubbing overlay.
    pub events_by_year: BTreeMap<i32, Vec<String>>,
    pub timeline: Vec<YearEntry>,
}

/// One ranked event on the statistics page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStatEntry {
    pub name: String,
    pub total: u64,
    pub runs_with_event: usize,
    pub percent_of_runs: f64,
    /// Color scale input in `[0, 1]`.
    pub intensity: f64,
    pub min_year: i32,
    pub max_year: i32,
    pub peak_year: i32,
    pub profile: Vec<f64>,
}

impl From<&EventDistribution> for EventStatEntry {
    fn from(dist: &EventDistribution) -> Self {
        Self {
            name: dist.name.clone(),
            total: dist.total,
            runs_with_event: dist.runs_with_event,
            percent_of_runs: dist.percent_of_runs,
            intensity: dist.run_fraction().clamp(0.0, 1.0),
            min_year: dist.min_year,
            max_year: dist.max_year,
            peak_year: dist.peak_year,
            profile: dist.profile.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunYearCell {
    pub year: i32,
    pub snapshot: Option<YearSnapshot>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunColumn {
    pub label: String,
    pub years: Vec<RunYearCell>,
}

/// Event statistics page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStatsReport {
    pub tags: Vec<Tag>,
    pub n_runs: usize,
    pub skipped_runs: usize,
    pub total_observed: usize,
    pub total_possible: usize,
    pub ranked: Vec<EventStatEntry>,
    pub uncatalogued: Vec<String>,
    pub comparison_charts: Vec<ChartRef>,
    /// Label column for the per-run grid.
    pub years: Vec<i32>,
    pub runs: Vec<RunColumn>,
}

/// Both report documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportModel {
    pub calibration: CalibrationReport,
    pub events: EventStatsReport,
}

/// Everything the assembler reads.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub metadata: &'a RunMetadata,
    pub dataset: &'a TimeSeriesDataset,
    pub groups: &'a ChartGroupSpec,
    pub narrative: &'a [YearEvents],
    pub icon_events: &'a [YearEvents],
    pub stats: &'a EnsembleStats,
    pub runs: &'a [RunRecord],
    /// Built charts; their file stems win over the stem derived from a title.
    pub charts: &'a [ChartSpec],
    pub comparison_charts: &'a [ChartSpec],
    pub skipped_runs: usize,
}

/// Composes the report models. Chart references use the file names the
/// configured renderer will write.
#[derive(Debug, Clone, Copy)]
pub struct ReportAssembler<'a> {
    extension: &'a str,
}

impl<'a> ReportAssembler<'a> {
    #[must_use]
    pub const fn new(extension: &'a str) -> Self {
        Self { extension }
    }

    #[must_use]
    pub fn assemble(&self, inputs: &ReportInputs<'_>) -> ReportModel {
        ReportModel {
            calibration: self.calibration_report(inputs),
            events: self.event_report(inputs),
        }
    }

    fn chart_ref(&self, title: &str, charts: &[ChartSpec]) -> ChartRef {
        let stem = charts
            .iter()
            .find(|spec| spec.title == title)
            .map_or_else(|| file_stem(title), |spec| spec.file_stem.clone());
        ChartRef {
            title: title.to_string(),
            file: chart_file_name(&stem, self.extension),
        }
    }

    #[must_use]
    pub fn calibration_report(&self, inputs: &ReportInputs<'_>) -> CalibrationReport {
        let start_year = inputs.metadata.start_year;
        let groups = inputs
            .groups
            .groups()
            .iter()
            .map(|group| ChartGroupRef {
                name: group.name.clone(),
                charts: group
                    .titles
                    .iter()
                    .map(|t| self.chart_ref(t, inputs.charts))
                    .collect(),
            })
            .collect();

        let timeline: Vec<YearEntry> = inputs
            .narrative
            .iter()
            .enumerate()
            .map_while(|(idx, year_events)| {
                let year = year_at(start_year, idx)?;
                let events: Vec<String> = year_events.iter().map(|e| e.label()).collect();
                let icon_events = inputs
                    .icon_events
                    .get(idx)
                    .map(icon_event_lines)
                    .unwrap_or_default();
                Some(YearEntry {
                    year,
                    quiet: events.is_empty(),
                    events,
                    icon_events,
                })
            })
            .collect();
        let events_by_year = timeline
            .iter()
            .map(|entry| (entry.year, entry.events.clone()))
            .collect();

        CalibrationReport {
            tags: tags(inputs.metadata),
            window: YearWindow::starting_at(start_year),
            rows: inputs.dataset.len(),
            groups,
            events_by_year,
            timeline,
        }
    }

    #[must_use]
    pub fn event_report(&self, inputs: &ReportInputs<'_>) -> EventStatsReport {
        let start_year = inputs.metadata.start_year;
        let stats = inputs.stats;
        let runs = inputs
            .runs
            .iter()
            .map(|run| RunColumn {
                label: run.label.clone(),
                years: (0..run.years().max(run.summary.len()))
                    .map_while(|idx| {
                        Some(RunYearCell {
                            year: year_at(start_year, idx)?,
                            snapshot: run.snapshot(idx).cloned(),
                            events: run
                                .events
                                .get(idx)
                                .map(|evs| evs.iter().map(|e| e.name.clone()).collect())
                                .unwrap_or_default(),
                        })
                    })
                    .collect(),
            })
            .collect();

        EventStatsReport {
            tags: tags(inputs.metadata),
            n_runs: stats.n_runs,
            skipped_runs: inputs.skipped_runs,
            total_observed: stats.total_observed,
            total_possible: stats.total_possible,
            ranked: stats.distributions.iter().map(EventStatEntry::from).collect(),
            uncatalogued: stats.uncatalogued.clone(),
            comparison_charts: inputs
                .comparison_charts
                .iter()
                .map(|spec| self.chart_ref(&spec.title, inputs.comparison_charts))
                .collect(),
            years: (0..REPORT_WINDOW_YEARS)
                .map_while(|offset| start_year.checked_add(offset))
                .collect(),
            runs,
        }
    }
}

fn tags(metadata: &RunMetadata) -> Vec<Tag> {
    metadata
        .tags()
        .into_iter()
        .map(|(key, value)| Tag { key, value })
        .collect()
}
