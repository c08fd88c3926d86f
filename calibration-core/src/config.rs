//! Report configuration: file layout, chart catalog and grouping rules.
//!
//! Everything here is data. The defaults describe the standard calibration
//! report; a JSON document with any subset of the fields overrides them.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::CalibrationError;

/// Width of the x-axis window shared by every chart, in years.
pub const REPORT_WINDOW_YEARS: i32 = 100;

/// Group that receives synthesized `Process-<Output>-<Category>` charts.
pub const PROCESS_GROUP: &str = "Process outputs";
/// Group that receives synthesized `Feedstock-<name>` charts.
pub const FEEDSTOCK_GROUP: &str = "Feedstocks";
/// Group that receives icon-event group charts.
pub const EVENTS_GROUP: &str = "Events";
/// Group that receives regional outlook charts.
pub const OUTLOOK_GROUP: &str = "Outlook";

/// Optional y-axis override. A missing bound is auto-scaled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl AxisRange {
    #[must_use]
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }
}

/// How a chart draws its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Continuous lines.
    #[default]
    Line,
    /// Sparse occurrence markers.
    Events,
}

/// One declared chart: a title and the dataset columns it plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDecl {
    pub title: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub range: Option<AxisRange>,
    #[serde(default)]
    pub kind: ChartKind,
}

impl ChartDecl {
    pub fn new<T, C, S>(title: T, columns: C) -> Self
    where
        T: Into<String>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            range: None,
            kind: ChartKind::Line,
        }
    }

    #[must_use]
    pub const fn with_range(mut self, range: AxisRange) -> Self {
        self.range = Some(range);
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A named tab of charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDecl {
    pub name: String,
    pub charts: Vec<String>,
}

/// Icon events plotted together in the `Events` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconEventGroup {
    pub title: String,
    pub events: Vec<String>,
}

/// Regions plotted together in the `Outlook` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionGroup {
    pub title: String,
    pub regions: Vec<String>,
}

/// Where the inputs live inside a calibration directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub primary_dataset: String,
    pub primary_metadata: String,
    pub event_catalog: String,
    pub run_file_pattern: String,
    pub include_primary_in_ensemble: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            primary_dataset: "0.csv".to_string(),
            primary_metadata: "0.json".to_string(),
            event_catalog: "all_events.json".to_string(),
            run_file_pattern: r"^[^.].*\.json$".to_string(),
            include_primary_in_ensemble: true,
        }
    }
}

/// Series style cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub palette: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            palette: [
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
                "#7f7f7f", "#bcbd22", "#17becf",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// Full configuration passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub layout: LayoutConfig,
    pub charts: Vec<ChartDecl>,
    pub groups: Vec<GroupDecl>,
    pub icon_event_groups: Vec<IconEventGroup>,
    pub region_groups: Vec<RegionGroup>,
    pub process_outputs: Vec<String>,
    pub region_range: AxisRange,
    pub style: StyleConfig,
}

impl CalibrationConfig {
    /// Parse a configuration document; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Config`] when the JSON is malformed or the
    /// resulting configuration is unusable.
    pub fn from_json(json: &str) -> Result<Self, CalibrationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| CalibrationError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let json = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.style.palette.is_empty() {
            return Err(CalibrationError::Config(
                "style.palette must contain at least one color".to_string(),
            ));
        }
        for chart in &self.charts {
            if let Some(AxisRange {
                min: Some(min),
                max: Some(max),
            }) = chart.range
                && min >= max
            {
                return Err(CalibrationError::Config(format!(
                    "chart '{}' has range min {min} >= max {max}",
                    chart.title
                )));
            }
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            charts: default_charts(),
            groups: default_groups(),
            icon_event_groups: default_icon_event_groups(),
            region_groups: default_region_groups(),
            process_outputs: ["Electricity", "Fuel", "PlantCalories", "AnimalCalories"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            region_range: AxisRange::between(0.0, 20.0),
            style: StyleConfig::default(),
        }
    }
}

fn group(name: &str, charts: &[&str]) -> GroupDecl {
    GroupDecl {
        name: name.to_string(),
        charts: charts.iter().map(ToString::to_string).collect(),
    }
}

fn default_groups() -> Vec<GroupDecl> {
    vec![
        group(
            "General",
            &[
                "Population (b)",
                "Temperature",
                "Habitability",
                "Extinction Rate",
                "Sea Level Rise",
                "Mean Income Level",
            ],
        ),
        group(
            "Emissions",
            &[
                "CO2eq Emissions",
                "CO2 Emissions (Gt)",
                "CH4 Emissions (Mt)",
                "N2O Emissions (Mt)",
            ],
        ),
        group(
            "Production",
            &[
                "Demand & Consumed",
                "Cal per Capita per Day",
                "Fuel (TWh)",
                "Electricity (TWh)",
                "Animal Calories (Tcals)",
                "Plant Calories (Tcals)",
                "Water",
                "Land",
            ],
        ),
        group("Electricity", &["Electricity (TWh)"]),
        group("Fuel", &["Fuel (TWh)"]),
        group("PlantCalories", &["Plant Calories (Tcals)"]),
        group("AnimalCalories", &["Animal Calories (Tcals)"]),
        group(OUTLOOK_GROUP, &["World Outlook"]),
        group(EVENTS_GROUP, &["Events"]),
    ]
}

fn emissions_chart(gas: &str, unit: &str) -> ChartDecl {
    let total = format!("{gas} Emissions ({unit})");
    ChartDecl::new(
        total.clone(),
        [
            total,
            format!("Energy {gas} Emissions ({unit})"),
            format!("Calorie {gas} Emissions ({unit})"),
            format!("Industry {gas} Emissions ({unit})"),
            format!("{gas} Ref ({unit})"),
        ],
    )
}

fn default_charts() -> Vec<ChartDecl> {
    vec![
        ChartDecl::new("Population (b)", ["Population (b)", "Pop Ref (2100, bn people)"]),
        ChartDecl::new("Events", ["Events"]).with_kind(ChartKind::Events),
        ChartDecl::new("Temperature", ["Temperature"]).with_range(AxisRange::between(0.0, 5.0)),
        ChartDecl::new("World Outlook", ["World Outlook"])
            .with_range(AxisRange::between(0.0, 50.0)),
        ChartDecl::new("Habitability", ["Habitability"])
            .with_range(AxisRange::between(0.0, 15.0)),
        ChartDecl::new("Extinction Rate", ["Extinction Rate"])
            .with_range(AxisRange::between(0.0, 100.0)),
        ChartDecl::new("Sea Level Rise", ["Sea Level Rise"]).with_range(AxisRange::at_least(0.0)),
        ChartDecl::new("CO2eq Emissions", ["CO2eq Emissions", "CO2eq Ref (Gt)"])
            .with_range(AxisRange::at_least(-25.0)),
        emissions_chart("CO2", "Gt").with_range(AxisRange::at_least(-25.0)),
        emissions_chart("CH4", "Mt"),
        emissions_chart("N2O", "Mt"),
        ChartDecl::new(
            "Fuel (TWh)",
            [
                "Industry Fuel Demand (TWh)",
                "Agg Fuel Demand (TWh)",
                "Produced Fuel (TWh)",
                "Fuel Ref (TWh)",
            ],
        )
        .with_range(AxisRange::at_least(0.0)),
        ChartDecl::new(
            "Electricity (TWh)",
            [
                "Industry Elec Demand (TWh)",
                "Agg Elec Demand (TWh)",
                "Produced Elec (TWh)",
                "Elec Ref (TWh)",
            ],
        )
        .with_range(AxisRange::at_least(0.0)),
        ChartDecl::new(
            "Animal Calories (Tcals)",
            [
                "Base Animal Cal Demand (Tcals)",
                "Agg Animal Cal Demand (Tcals)",
                "Produced Animal Cals (Tcals)",
            ],
        )
        .with_range(AxisRange::at_least(0.0)),
        ChartDecl::new(
            "Plant Calories (Tcals)",
            [
                "Base Plant Cal Demand (Tcals)",
                "Agg Plant Cal Demand (Tcals)",
                "Produced Plant Cals (Tcals)",
            ],
        )
        .with_range(AxisRange::at_least(0.0)),
        ChartDecl::new(
            "Demand & Consumed",
            [
                "Produced Fuel (% Demand)",
                "Produced Elec (% Demand)",
                "Produced Animal Cals (% Demand)",
                "Produced Plant Cals (% Demand)",
                "Consumed Water (%)",
                "Consumed Land (%)",
            ],
        ),
        ChartDecl::new(
            "Water",
            [
                "Energy Water Req. (km3)",
                "Calorie Water Req. (km3)",
                "Industry Water Demand (km3)",
                "Water Ref (km3)",
            ],
        ),
        ChartDecl::new(
            "Land",
            [
                "Energy Land Req. (km2)",
                "Calorie Land Req. (km2)",
                "Cals Land Ref (km2)",
            ],
        )
        .with_range(AxisRange::at_least(0.0)),
        ChartDecl::new(
            "Cal per Capita per Day",
            ["Cal/Capita/Day", "Cals Ref (kcal/person/day)"],
        )
        .with_range(AxisRange::between(0.0, 4000.0)),
        ChartDecl::new("Mean Income Level", ["Mean Income Level"]),
    ]
}

fn icon_group(title: &str, events: &[&str]) -> IconEventGroup {
    IconEventGroup {
        title: title.to_string(),
        events: events.iter().map(ToString::to_string).collect(),
    }
}

fn default_icon_event_groups() -> Vec<IconEventGroup> {
    vec![
        icon_group(
            "Flooding",
            &["Flooding", "Severe Flooding", "Extreme Flooding"],
        ),
        icon_group("Storms", &["Severe Hurricane", "Large Derecho Storm"]),
        icon_group("Wildfires", &["Wildfires", "Severe Wildfires"]),
        icon_group("Social Unrest", &["Protests", "Riots", "Revolts"]),
        icon_group("Heatwaves", &["Heatwaves"]),
        icon_group("Crop Failures", &["Crop Failures"]),
        icon_group("Disease Outbreak", &["Disease Outbreak"]),
        icon_group("Attacks", &["Doom Cult Attacks"]),
    ]
}

fn region_group(title: &str, regions: &[&str]) -> RegionGroup {
    RegionGroup {
        title: title.to_string(),
        regions: regions.iter().map(ToString::to_string).collect(),
    }
}

fn default_region_groups() -> Vec<RegionGroup> {
    vec![
        region_group(
            "Asia",
            &[
                "Central Asia",
                "Eastern Asia",
                "South-eastern Asia",
                "Southern Asia",
                "Western Asia",
            ],
        ),
        region_group(
            "Africa",
            &[
                "Eastern Africa",
                "Central Africa",
                "Northern Africa",
                "Southern Africa",
                "Southern Asia",
            ],
        ),
        region_group(
            "Europe & Neo-Europe",
            &[
                "Eastern Europe",
                "Northern Europe",
                "Southern Europe",
                "Western Europe",
                "Northern America",
                "Australasia",
            ],
        ),
        region_group(
            "Americas & Islands",
            &[
                "Central America",
                "Southern America",
                "Caribbean",
                "Oceania",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_groups_reference_declared_charts() {
        let config = CalibrationConfig::default();
        for group in &config.groups {
            for title in &group.charts {
                assert!(
                    config.charts.iter().any(|c| &c.title == title),
                    "group {} references undeclared chart {title}",
                    group.name
                );
            }
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CalibrationConfig::from_json(
            r#"{ "layout": { "primary_dataset": "main.csv" }, "process_outputs": ["Fuel"] }"#,
        )
        .unwrap();
        assert_eq!(config.layout.primary_dataset, "main.csv");
        assert_eq!(config.layout.primary_metadata, "0.json");
        assert_eq!(config.process_outputs, vec!["Fuel".to_string()]);
        assert_eq!(config.style.palette.len(), 10);
        assert!(!config.charts.is_empty());
    }

    #[test]
    fn rejects_inverted_range() {
        let err = CalibrationConfig::from_json(
            r#"{ "charts": [{ "title": "T", "columns": ["T"], "range": { "min": 5, "max": 1 } }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationError::Config(msg) if msg.contains("'T'")));
    }

    #[test]
    fn rejects_empty_palette() {
        let err = CalibrationConfig::from_json(r#"{ "style": { "palette": [] } }"#).unwrap_err();
        assert!(matches!(err, CalibrationError::Config(_)));
    }

    #[test]
    fn chart_kind_parses_lowercase() {
        let decl: ChartDecl =
            serde_json::from_str(r#"{ "title": "Events", "columns": ["Events"], "kind": "events" }"#)
                .unwrap();
        assert_eq!(decl.kind, ChartKind::Events);
        assert!(decl.range.is_none());
    }
}
