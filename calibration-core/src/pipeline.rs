//! End-to-end report generation for one calibration directory.
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::charts::{ChartSpec, ChartSpecBuilder, FileStems};
use crate::config::CalibrationConfig;
use crate::distribution::{EnsembleStats, EventDistributionEngine};
use crate::error::{CalibrationError, Diagnostics};
use crate::model::TimeSeriesDataset;
use crate::report::{ReportAssembler, ReportInputs, ReportModel};
use crate::series::{ChartGroupSpec, SeriesAggregator};
use crate::store::{Ensemble, RunStore};

pub const CALIBRATION_REPORT_FILE: &str = "calibration_report.json";
pub const EVENT_REPORT_FILE: &str = "event_report.json";

/// Everything produced for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportBundle {
    pub dataset: TimeSeriesDataset,
    pub groups: ChartGroupSpec,
    /// One spec per distinct chart title, in group order.
    pub charts: Vec<ChartSpec>,
    pub comparison_charts: Vec<ChartSpec>,
    pub stats: EnsembleStats,
    pub report: ReportModel,
    pub diagnostics: Diagnostics,
}

impl ReportBundle {
    /// Every chart that needs an image.
    pub fn all_charts(&self) -> impl Iterator<Item = &ChartSpec> {
        self.charts.iter().chain(&self.comparison_charts)
    }

    /// Write both report documents into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error for the first file that fails.
    pub fn write_documents(&self, dir: &Path) -> Result<Vec<PathBuf>, CalibrationError> {
        fs::create_dir_all(dir).map_err(|source| CalibrationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let calibration = dir.join(CALIBRATION_REPORT_FILE);
        write_json(&calibration, &self.report.calibration)?;
        let events = dir.join(EVENT_REPORT_FILE);
        write_json(&events, &self.report.events)?;
        Ok(vec![calibration, events])
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CalibrationError> {
    let file = fs::File::create(path).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| {
        CalibrationError::Json {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// RunStore, then aggregation and distributions, then charts and reports.
#[derive(Debug, Clone)]
pub struct CalibrationPipeline {
    config: CalibrationConfig,
    chart_extension: &'static str,
}

impl CalibrationPipeline {
    #[must_use]
    pub const fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            chart_extension: "svg",
        }
    }

    /// Extension used for chart file references in the reports.
    #[must_use]
    pub const fn with_chart_extension(mut self, extension: &'static str) -> Self {
        self.chart_extension = extension;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Load `dir` (the calibration directory) and build the report.
    ///
    /// # Errors
    ///
    /// Fails only when the primary inputs or the event catalog cannot be
    /// read; every other problem ends up in [`ReportBundle::diagnostics`].
    pub fn run(&self, dir: &Path) -> Result<ReportBundle, CalibrationError> {
        let mut diagnostics = Diagnostics::new();
        let store = RunStore::open(dir, &self.config.layout)?;
        let ensemble = store.load(&mut diagnostics)?;
        Ok(self.build(ensemble, diagnostics))
    }

    /// Build the report from already loaded inputs.
    #[must_use]
    pub fn build(&self, ensemble: Ensemble, mut diagnostics: Diagnostics) -> ReportBundle {
        let Ensemble {
            primary,
            runs,
            catalog,
        } = ensemble;
        let start_year = primary.metadata.start_year;

        let aggregator = SeriesAggregator::new(&self.config);
        let dataset = aggregator.merge(primary.dataset, &primary.icon_events, &mut diagnostics);
        let groups = aggregator.chart_groups(&dataset);

        let stats =
            EventDistributionEngine::new(start_year).compute(&runs, &catalog, &mut diagnostics);

        let builder = ChartSpecBuilder::new(&self.config.style.palette, start_year);
        let mut stems = FileStems::new();
        let charts = builder.build_all(&groups, &dataset, &mut stems, &mut diagnostics);
        let comparison_charts = builder.comparison_charts(&runs, &mut stems, &mut diagnostics);

        let report = ReportAssembler::new(self.chart_extension).assemble(&ReportInputs {
            metadata: &primary.metadata,
            dataset: &dataset,
            groups: &groups,
            narrative: &primary.events,
            icon_events: &primary.icon_events,
            stats: &stats,
            runs: &runs,
            charts: &charts,
            comparison_charts: &comparison_charts,
            skipped_runs: diagnostics.malformed_runs(),
        });
        log::info!(
            "built {} charts, {} run comparisons, {} ranked events ({} warnings)",
            charts.len(),
            comparison_charts.len(),
            stats.distributions.len(),
            diagnostics.len()
        );

        ReportBundle {
            dataset,
            groups,
            charts,
            comparison_charts,
            stats,
            report,
            diagnostics,
        }
    }
}
