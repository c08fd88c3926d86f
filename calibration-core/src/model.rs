//! Run records, metadata and the year-indexed dataset.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::REPORT_WINDOW_YEARS;
use crate::error::CalibrationError;

/// Name of the year column in the primary dataset.
pub const YEAR_COLUMN: &str = "Year";

/// Calendar year `offset` years after `start_year`, or `None` past `i32::MAX`.
#[must_use]
pub fn year_at(start_year: i32, offset: usize) -> Option<i32> {
    i32::try_from(offset)
        .ok()
        .and_then(|offset| start_year.checked_add(offset))
}

/// One occurrence of an event within one simulated year of one run.
///
/// On disk this is the pair `[name, region]` with `region` possibly `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    from = "(String, Option<String>)",
    into = "(String, Option<String>)"
)]
pub struct EventOccurrence {
    pub name: String,
    pub region: Option<String>,
}

impl EventOccurrence {
    pub fn new(name: impl Into<String>, region: Option<&str>) -> Self {
        Self {
            name: name.into(),
            region: region.map(ToString::to_string),
        }
    }

    /// Human label, `"<name> in <region>"` when the event is regional.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.region {
            Some(region) => format!("{} in {region}", self.name),
            None => self.name.clone(),
        }
    }
}

impl From<(String, Option<String>)> for EventOccurrence {
    fn from((name, region): (String, Option<String>)) -> Self {
        Self { name, region }
    }
}

impl From<EventOccurrence> for (String, Option<String>) {
    fn from(event: EventOccurrence) -> Self {
        (event.name, event.region)
    }
}

/// Occurrences recorded for a single year.
pub type YearEvents = SmallVec<[EventOccurrence; 4]>;

/// Scalar snapshot of one run for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSnapshot {
    pub temp: f64,
    pub emissions: f64,
    pub outlook: f64,
    pub extinction_rate: f64,
    pub habitability: f64,
    pub land_use: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl YearSnapshot {
    /// Numeric fields in a stable order: the named fields first, then any
    /// extra numeric keys alphabetically.
    #[must_use]
    pub fn fields(&self) -> Vec<(&str, f64)> {
        let mut fields = vec![
            ("temp", self.temp),
            ("emissions", self.emissions),
            ("outlook", self.outlook),
            ("extinction_rate", self.extinction_rate),
            ("habitability", self.habitability),
            ("land_use", self.land_use),
        ];
        fields.extend(
            self.extra
                .iter()
                .filter_map(|(key, value)| value.as_f64().map(|v| (key.as_str(), v))),
        );
        fields
    }
}

/// One simulation run as stored in a calibration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(skip)]
    pub label: String,
    pub events: Vec<YearEvents>,
    pub summary: Vec<YearSnapshot>,
}

impl RunRecord {
    /// Parse a run document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document does not match the run schema.
    pub fn from_json(label: impl Into<String>, json: &str) -> Result<Self, serde_json::Error> {
        let mut record: Self = serde_json::from_str(json)?;
        record.label = label.into();
        Ok(record)
    }

    #[must_use]
    pub fn years(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn snapshot(&self, index: usize) -> Option<&YearSnapshot> {
        self.summary.get(index)
    }
}

/// Configuration of the primary run, once the event logs have been taken out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub scenarios: Vec<String>,
    pub start_year: i32,
    pub fields: BTreeMap<String, Value>,
}

/// The primary metadata document split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    pub metadata: RunMetadata,
    pub icon_events: Vec<YearEvents>,
    pub events: Vec<YearEvents>,
}

impl MetadataDocument {
    /// Split a metadata document. `icon_events`, `events` and `summary` are
    /// removed; whatever remains becomes display fields.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidMetadata`] when required fields are
    /// missing or have the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, CalibrationError> {
        let Value::Object(mut map) = value else {
            return Err(CalibrationError::InvalidMetadata(
                "metadata must be a JSON object".to_string(),
            ));
        };

        let start_year = map
            .remove("start_year")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| {
                CalibrationError::InvalidMetadata("missing integer `start_year`".to_string())
            })?;
        if start_year.checked_add(REPORT_WINDOW_YEARS).is_none() {
            return Err(CalibrationError::InvalidMetadata(format!(
                "`start_year` {start_year} leaves no room for a {REPORT_WINDOW_YEARS}-year window"
            )));
        }
        let scenarios: Vec<String> = take_field(&mut map, "scenarios")?.unwrap_or_default();
        let icon_events: Vec<YearEvents> = take_field(&mut map, "icon_events")?.unwrap_or_default();
        let events: Vec<YearEvents> = take_field(&mut map, "events")?.unwrap_or_default();
        map.remove("summary");

        Ok(Self {
            metadata: RunMetadata {
                scenarios,
                start_year,
                fields: map.into_iter().collect(),
            },
            icon_events,
            events,
        })
    }
}

fn take_field<T>(map: &mut Map<String, Value>, key: &str) -> Result<Option<T>, CalibrationError>
where
    T: serde::de::DeserializeOwned,
{
    map.remove(key)
        .map(|value| {
            serde_json::from_value(value).map_err(|err| {
                CalibrationError::InvalidMetadata(format!("field `{key}`: {err}"))
            })
        })
        .transpose()
}

impl RunMetadata {
    /// Key/value pairs for the metadata strip, sorted by key. Scenarios are
    /// joined with commas; string values are shown without quotes.
    #[must_use]
    pub fn tags(&self) -> Vec<(String, String)> {
        let mut tags: BTreeMap<String, String> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), display_value(value)))
            .collect();
        tags.insert("scenarios".to_string(), self.scenarios.join(","));
        tags.insert("start_year".to_string(), self.start_year.to_string());
        tags.into_iter().collect()
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Every event the model can produce, observed or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCatalog {
    names: Vec<String>,
    lookup: HashSet<String>,
    size: usize,
}

impl EventCatalog {
    /// Build a catalog from the catalog document. The size of the top-level
    /// collection is the number of possible events.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the document is neither an
    /// array nor an object.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let (names, size): (Vec<String>, usize) = match value {
            Value::Array(items) => (
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(obj) => {
                            obj.get("name").and_then(Value::as_str).map(str::to_string)
                        }
                        _ => None,
                    })
                    .collect(),
                items.len(),
            ),
            Value::Object(map) => (map.keys().cloned().collect(), map.len()),
            _ => return Err("event catalog must be an array or an object".to_string()),
        };
        Ok(Self {
            lookup: names.iter().cloned().collect(),
            names,
            size,
        })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        Self {
            lookup: names.iter().cloned().collect(),
            size: names.len(),
            names,
        }
    }

    /// Number of possible events.
    #[must_use]
    pub const fn total_possible(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single dataset value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Interpret a raw CSV field.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            Ok(_) => Self::Missing,
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Year-indexed table. Rows are contiguous years starting at `start_year`;
/// columns can be added but never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesDataset {
    start_year: i32,
    years: Vec<i32>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl TimeSeriesDataset {
    /// Create an empty dataset with `rows` contiguous years. Rows past
    /// `i32::MAX` are not representable and are left out.
    #[must_use]
    pub fn with_rows(start_year: i32, rows: usize) -> Self {
        let years = (0..rows)
            .map_while(|offset| year_at(start_year, offset))
            .collect();
        Self {
            start_year,
            years,
            columns: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a dataset from a parsed table. The header must contain the
    /// [`YEAR_COLUMN`]; every other header becomes a column.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidDataset`] when the year column is
    /// missing, unparsable, or not contiguous from `start_year`.
    pub fn from_table(
        start_year: i32,
        header: &[String],
        rows: &[Vec<String>],
    ) -> Result<Self, CalibrationError> {
        let year_idx = header
            .iter()
            .position(|h| h.trim() == YEAR_COLUMN)
            .ok_or_else(|| {
                CalibrationError::InvalidDataset(format!("missing `{YEAR_COLUMN}` column"))
            })?;

        for (offset, row) in rows.iter().enumerate() {
            let raw = row.get(year_idx).map_or("", String::as_str);
            let year = parse_year(raw).ok_or_else(|| {
                CalibrationError::InvalidDataset(format!("row {offset}: bad year `{raw}`"))
            })?;
            let expected = year_at(start_year, offset).ok_or_else(|| {
                CalibrationError::InvalidDataset(format!("row {offset}: year out of range"))
            })?;
            if year != expected {
                return Err(CalibrationError::InvalidDataset(format!(
                    "row {offset}: expected year {expected}, found {year}"
                )));
            }
        }

        let mut dataset = Self::with_rows(start_year, rows.len());
        for (col_idx, name) in header.iter().enumerate() {
            if col_idx == year_idx {
                continue;
            }
            let values = rows
                .iter()
                .map(|row| row.get(col_idx).map_or(Cell::Missing, |raw| Cell::parse(raw)))
                .collect();
            if !dataset.push_column(name.trim(), values) {
                log::debug!("ignoring duplicate dataset column {name}");
            }
        }
        Ok(dataset)
    }

    /// Append a column. Returns `false` and leaves the dataset unchanged if a
    /// column with that name exists or the length does not match the rows.
    pub fn push_column(&mut self, name: &str, values: Vec<Cell>) -> bool {
        if self.index.contains_key(name) || values.len() != self.years.len() {
            return false;
        }
        self.index.insert(name.to_string(), self.columns.len());
        self.columns.push(Column {
            name: name.to_string(),
            values,
        });
        true
    }

    #[must_use]
    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    #[must_use]
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.years.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(year, value)` points for the numeric cells of a column.
    #[must_use]
    pub fn numeric_points(&self, name: &str) -> Option<Vec<(i32, f64)>> {
        let column = self.column(name)?;
        Some(
            self.years
                .iter()
                .zip(&column.values)
                .filter_map(|(&year, cell)| cell.as_f64().map(|v| (year, v)))
                .collect(),
        )
    }
}

fn parse_year(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if let Ok(year) = trimmed.parse::<i32>() {
        return Some(year);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        #[allow(clippy::cast_possible_truncation)]
        Some(value as i32)
    } else {
        None
    }
}
