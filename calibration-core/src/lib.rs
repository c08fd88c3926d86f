//! Calibration Core
//!
//! Run aggregation and event distribution engine for world-simulation
//! calibration reports. This crate loads one run ensemble, merges and groups
//! its time series, computes per-event occurrence statistics, and produces
//! chart specifications and report models. Drawing and page templating are
//! left to callers.

pub mod charts;
pub mod config;
pub mod distribution;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod series;
pub mod store;

// Re-export commonly used types
pub use charts::{
    ChartSpec, ChartSpecBuilder, FileStems, LineStyle, SeriesSpec, SeriesStyle, YBounds,
    YearWindow, file_stem,
};
pub use config::{
    AxisRange, CalibrationConfig, ChartDecl, ChartKind, GroupDecl, IconEventGroup, LayoutConfig,
    REPORT_WINDOW_YEARS, RegionGroup, StyleConfig,
};
pub use distribution::{
    EnsembleStats, EnsembleTally, EventDistribution, EventDistributionEngine, RunTally,
};
pub use error::{CalibrationError, Diagnostic, Diagnostics};
pub use model::{
    Cell, EventCatalog, EventOccurrence, MetadataDocument, RunMetadata, RunRecord,
    TimeSeriesDataset, YearEvents, YearSnapshot, year_at,
};
pub use pipeline::{CALIBRATION_REPORT_FILE, CalibrationPipeline, EVENT_REPORT_FILE, ReportBundle};
pub use render::{ChartRenderer, JsonChartRenderer, render_all};
pub use report::{
    CalibrationReport, ChartGroupRef, ChartRef, EventStatEntry, EventStatsReport, ReportAssembler,
    ReportModel,
};
pub use series::{ChartGroupSpec, ColumnIndex, SeriesAggregator};
pub use store::{Ensemble, PrimaryRun, RunStore, calibration_dir};
