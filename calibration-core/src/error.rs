//! Fatal errors and accumulated diagnostics.
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort report generation.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read dataset {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid run metadata: {0}")]
    InvalidMetadata(String),
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid run file pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Non-fatal problems collected while building a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A calibration run file could not be parsed and was left out of the ensemble.
    MalformedRun { path: String, reason: String },
    /// A chart declared a column the dataset does not have.
    MissingColumn { chart: String, column: String },
    /// An event occurred in a run but is not listed in the event catalog.
    UncataloguedEvent { name: String },
    /// A derived column would have replaced an existing dataset column.
    ColumnCollision { column: String },
    /// The icon-event log covers more years than the dataset has rows.
    IconLogOverflow { extra_years: usize },
    /// Two chart titles map to the same file name; the later chart gets a suffix.
    FileNameCollision { title: String, file_stem: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRun { path, reason } => {
                write!(f, "skipped malformed run {path}: {reason}")
            }
            Self::MissingColumn { chart, column } => {
                write!(f, "chart '{chart}' is missing column '{column}'")
            }
            Self::UncataloguedEvent { name } => {
                write!(f, "event '{name}' occurred but is not in the event catalog")
            }
            Self::ColumnCollision { column } => {
                write!(f, "derived column '{column}' already exists in the dataset")
            }
            Self::IconLogOverflow { extra_years } => {
                write!(f, "icon event log has {extra_years} year(s) beyond the dataset")
            }
            Self::FileNameCollision { title, file_stem } => {
                write!(f, "chart '{title}' shares a file name, written as '{file_stem}'")
            }
        }
    }
}

/// Ordered warning log handed back to the operator with the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    #[must_use]
    pub fn malformed_runs(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::MalformedRun { .. }))
            .count()
    }

    #[must_use]
    pub fn missing_columns_for(&self, chart: &str) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::MissingColumn { chart: c, .. } if c == chart))
            .count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_keep_insertion_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::MissingColumn {
            chart: "Temperature".to_string(),
            column: "Temp".to_string(),
        });
        diagnostics.push(Diagnostic::MalformedRun {
            path: "7.json".to_string(),
            reason: "EOF".to_string(),
        });
        let kinds: Vec<_> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds[0].contains("Temperature"));
        assert_eq!(diagnostics.malformed_runs(), 1);
        assert_eq!(diagnostics.missing_columns_for("Temperature"), 1);
        assert_eq!(diagnostics.missing_columns_for("Land"), 0);
    }

    #[test]
    fn diagnostics_serialize_with_kind_tag() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::UncataloguedEvent {
            name: "Meteor".to_string(),
        });
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json[0]["kind"], "uncatalogued_event");
        assert_eq!(json[0]["name"], "Meteor");
    }

    #[test]
    fn not_found_message_names_path() {
        let err = CalibrationError::NotFound {
            what: "primary dataset",
            path: PathBuf::from("/tmp/run/0.csv"),
        };
        assert_eq!(err.to_string(), "primary dataset not found at /tmp/run/0.csv");
    }
}
