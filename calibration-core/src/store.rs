//! Loading one calibration directory from disk.
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LayoutConfig;
use crate::error::{CalibrationError, Diagnostic, Diagnostics};
use crate::model::{
    EventCatalog, MetadataDocument, RunMetadata, RunRecord, TimeSeriesDataset, YearEvents,
};

/// Name of the directory holding calibration files inside a run directory.
pub const CALIBRATION_DIR: &str = "calibration";

/// Accept either a run directory or its calibration subdirectory.
#[must_use]
pub fn calibration_dir(path: &Path) -> PathBuf {
    if path.file_name().is_some_and(|name| name == CALIBRATION_DIR) {
        path.to_path_buf()
    } else {
        path.join(CALIBRATION_DIR)
    }
}

/// The fully described primary run.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryRun {
    pub metadata: RunMetadata,
    pub icon_events: Vec<YearEvents>,
    pub events: Vec<YearEvents>,
    pub dataset: TimeSeriesDataset,
}

/// Everything read from a calibration directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    pub primary: PrimaryRun,
    pub runs: Vec<RunRecord>,
    pub catalog: EventCatalog,
}

/// Reads the primary run, the calibration runs and the event catalog.
#[derive(Debug, Clone)]
pub struct RunStore<'a> {
    dir: PathBuf,
    layout: &'a LayoutConfig,
    run_pattern: Regex,
}

impl<'a> RunStore<'a> {
    /// # Errors
    ///
    /// Returns [`CalibrationError::NotFound`] if `dir` is not a directory and
    /// [`CalibrationError::Pattern`] if the run file pattern does not compile.
    pub fn open(
        dir: impl Into<PathBuf>,
        layout: &'a LayoutConfig,
    ) -> Result<Self, CalibrationError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(CalibrationError::NotFound {
                what: "calibration directory",
                path: dir,
            });
        }
        let run_pattern =
            Regex::new(&layout.run_file_pattern).map_err(|source| CalibrationError::Pattern {
                pattern: layout.run_file_pattern.clone(),
                source,
            })?;
        Ok(Self {
            dir,
            layout,
            run_pattern,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the whole directory. Calibration runs that fail to parse are
    /// recorded in `diagnostics` and left out.
    ///
    /// # Errors
    ///
    /// Fails when the primary dataset, primary metadata or event catalog is
    /// missing or unreadable.
    pub fn load(&self, diagnostics: &mut Diagnostics) -> Result<Ensemble, CalibrationError> {
        let primary = self.load_primary()?;
        let catalog = self.load_catalog()?;
        let runs = self.load_runs(diagnostics)?;
        log::info!(
            "loaded {} calibration runs and {} catalog events from {}",
            runs.len(),
            catalog.total_possible(),
            self.dir.display()
        );
        Ok(Ensemble {
            primary,
            runs,
            catalog,
        })
    }

    /// # Errors
    ///
    /// Returns [`CalibrationError::NotFound`] when either primary file is
    /// absent, or a parse error for the file that is malformed.
    pub fn load_primary(&self) -> Result<PrimaryRun, CalibrationError> {
        let metadata_path = self.require(&self.layout.primary_metadata, "primary metadata")?;
        let dataset_path = self.require(&self.layout.primary_dataset, "primary dataset")?;

        let document = MetadataDocument::from_value(read_json(&metadata_path)?)?;
        let dataset = read_dataset(&dataset_path, document.metadata.start_year)?;
        Ok(PrimaryRun {
            metadata: document.metadata,
            icon_events: document.icon_events,
            events: document.events,
            dataset,
        })
    }

    /// # Errors
    ///
    /// Returns [`CalibrationError::NotFound`] when the catalog is absent.
    pub fn load_catalog(&self) -> Result<EventCatalog, CalibrationError> {
        let path = self.require(&self.layout.event_catalog, "event catalog")?;
        EventCatalog::from_value(&read_json(&path)?)
            .map_err(|reason| CalibrationError::InvalidDataset(format!("event catalog: {reason}")))
    }

    /// Calibration run files in processing order: numeric stems ascending,
    /// then everything else by name.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Io`] if the directory cannot be listed.
    pub fn discover_runs(&self) -> Result<Vec<PathBuf>, CalibrationError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| CalibrationError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CalibrationError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !self.is_run_file(&name) || !entry.path().is_file() {
                continue;
            }
            files.push(entry.path());
        }
        files.sort_by_key(|path| run_order(path));
        Ok(files)
    }

    fn is_run_file(&self, name: &str) -> bool {
        if name == self.layout.event_catalog {
            return false;
        }
        if name == self.layout.primary_metadata && !self.layout.include_primary_in_ensemble {
            return false;
        }
        self.run_pattern.is_match(name)
    }

    /// # Errors
    ///
    /// Only directory listing failures are errors; bad files become
    /// [`Diagnostic::MalformedRun`].
    pub fn load_runs(
        &self,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<RunRecord>, CalibrationError> {
        let mut runs = Vec::new();
        for path in self.discover_runs()? {
            let label = path
                .file_stem()
                .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
            let parsed = fs::read_to_string(&path)
                .map_err(|err| err.to_string())
                .and_then(|body| {
                    RunRecord::from_json(&label, &body).map_err(|err| err.to_string())
                });
            match parsed {
                Ok(run) => runs.push(run),
                Err(reason) => diagnostics.push(Diagnostic::MalformedRun {
                    path: path.display().to_string(),
                    reason,
                }),
            }
        }
        Ok(runs)
    }

    fn require(&self, name: &str, what: &'static str) -> Result<PathBuf, CalibrationError> {
        let path = self.dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(CalibrationError::NotFound { what, path })
        }
    }
}

fn run_order(path: &Path) -> (u8, u64, String) {
    let name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let numeric = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<u64>().ok());
    match numeric {
        Some(n) => (0, n, name),
        None => (1, 0, name),
    }
}

fn read_json(path: &Path) -> Result<Value, CalibrationError> {
    let body = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| CalibrationError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_dataset(path: &Path, start_year: i32) -> Result<TimeSeriesDataset, CalibrationError> {
    let csv_err = |source| CalibrationError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    TimeSeriesDataset::from_table(start_year, &header, &rows)
}
