//! Renderable chart specifications.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::{AxisRange, ChartDecl, ChartKind, REPORT_WINDOW_YEARS};
use crate::error::{Diagnostic, Diagnostics};
use crate::model::{RunRecord, TimeSeriesDataset, year_at};
use crate::series::ChartGroupSpec;

/// Prefix of run comparison chart titles.
pub const RUN_CHART_PREFIX: &str = "runs__";

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._ -]+").expect("static pattern compiles"));

/// Deterministic file stem for a chart title.
#[must_use]
pub fn file_stem(title: &str) -> String {
    let stem = UNSAFE_FILE_CHARS.replace_all(title.trim(), "_");
    if stem.is_empty() {
        "chart".to_string()
    } else {
        stem.into_owned()
    }
}

/// File stems already handed out for one output directory. Comparison is
/// case-insensitive so the names stay distinct on case-folding filesystems.
#[derive(Debug, Clone, Default)]
pub struct FileStems {
    taken: HashSet<String>,
}

impl FileStems {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a stem for `title`. A title whose stem is already taken gets
    /// the first free `_2`, `_3`, ... suffix and a diagnostic.
    pub fn claim(&mut self, title: &str, diagnostics: &mut Diagnostics) -> String {
        let base = file_stem(title);
        if self.taken.insert(base.to_lowercase()) {
            return base;
        }
        let mut suffix = 2_usize;
        let stem = loop {
            let candidate = format!("{base}_{suffix}");
            if self.taken.insert(candidate.to_lowercase()) {
                break candidate;
            }
            suffix += 1;
        };
        diagnostics.push(Diagnostic::FileNameCollision {
            title: title.to_string(),
            file_stem: stem.clone(),
        });
        stem
    }
}

/// Stroke pattern for a line series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

impl LineStyle {
    pub const CYCLE: [Self; 4] = [Self::Solid, Self::Dashed, Self::DashDot, Self::Dotted];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesStyle {
    pub color: String,
    pub line: LineStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSpec {
    pub label: String,
    pub points: Vec<(i32, f64)>,
    pub style: SeriesStyle,
}

/// Inclusive x-axis window in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearWindow {
    pub start: i32,
    pub end: i32,
}

impl YearWindow {
    #[must_use]
    pub const fn starting_at(start_year: i32) -> Self {
        Self {
            start: start_year,
            end: start_year.saturating_add(REPORT_WINDOW_YEARS),
        }
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YBounds {
    pub min: f64,
    pub max: f64,
}

impl YBounds {
    /// Apply `range` where it is set and fit the data elsewhere.
    #[must_use]
    pub fn resolve(range: Option<AxisRange>, values: impl IntoIterator<Item = f64>) -> Self {
        let (data_min, data_max) = values
            .into_iter()
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                None => Some((v, v)),
            })
            .unwrap_or((0.0, 1.0));
        let range = range.unwrap_or_default();
        let mut min = range.min.unwrap_or(data_min);
        let mut max = range.max.unwrap_or(data_max);
        if max <= min {
            if range.max.is_none() {
                max = min + 1.0;
            } else {
                min = max - 1.0;
            }
        }
        Self { min, max }
    }
}

/// Everything a plotting backend needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub file_stem: String,
    pub kind: ChartKind,
    pub x: YearWindow,
    pub y: YBounds,
    pub series: Vec<SeriesSpec>,
}

/// Turns chart declarations into [`ChartSpec`]s over a fixed year window.
#[derive(Debug, Clone)]
pub struct ChartSpecBuilder<'a> {
    palette: &'a [String],
    window: YearWindow,
}

impl<'a> ChartSpecBuilder<'a> {
    #[must_use]
    pub const fn new(palette: &'a [String], start_year: i32) -> Self {
        Self {
            palette,
            window: YearWindow::starting_at(start_year),
        }
    }

    #[must_use]
    pub const fn window(&self) -> YearWindow {
        self.window
    }

    /// Colors cycle every series; the stroke advances once per full pass
    /// through the palette, so series `n` and `n + palette.len()` share a
    /// color but not a stroke.
    #[must_use]
    pub fn style_for(&self, index: usize) -> SeriesStyle {
        let colors = self.palette.len().max(1);
        let color = self
            .palette
            .get(index % colors)
            .cloned()
            .unwrap_or_else(|| "#000000".to_string());
        let line = LineStyle::CYCLE[(index / colors) % LineStyle::CYCLE.len()];
        SeriesStyle { color, line }
    }

    /// Build a chart from the dataset. Missing columns are reported and
    /// skipped; the chart is produced even if no column is present.
    pub fn build(
        &self,
        decl: &ChartDecl,
        dataset: &TimeSeriesDataset,
        diagnostics: &mut Diagnostics,
    ) -> ChartSpec {
        let mut present = Vec::with_capacity(decl.columns.len());
        for column in &decl.columns {
            match dataset.numeric_points(column) {
                Some(points) => present.push((column.clone(), points)),
                None => diagnostics.push(Diagnostic::MissingColumn {
                    chart: decl.title.clone(),
                    column: column.clone(),
                }),
            }
        }
        self.from_series(&decl.title, decl.kind, decl.range, present)
    }

    /// Build a chart from already extracted series.
    #[must_use]
    pub fn from_series(
        &self,
        title: &str,
        kind: ChartKind,
        range: Option<AxisRange>,
        series: Vec<(String, Vec<(i32, f64)>)>,
    ) -> ChartSpec {
        let y = YBounds::resolve(
            range,
            series
                .iter()
                .flat_map(|(_, points)| points.iter().map(|&(_, v)| v)),
        );
        let series = series
            .into_iter()
            .enumerate()
            .map(|(idx, (label, points))| SeriesSpec {
                label,
                points,
                style: self.style_for(idx),
            })
            .collect();
        ChartSpec {
            title: title.to_string(),
            file_stem: file_stem(title),
            kind,
            x: self.window,
            y,
            series,
        }
    }

    /// One chart per distinct title, in group order, each with its own file stem.
    pub fn build_all(
        &self,
        groups: &ChartGroupSpec,
        dataset: &TimeSeriesDataset,
        stems: &mut FileStems,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ChartSpec> {
        groups
            .titles()
            .into_iter()
            .map(|title| {
                let mut spec = self.build(&groups.declaration(title), dataset, diagnostics);
                spec.file_stem = stems.claim(&spec.title, diagnostics);
                spec
            })
            .collect()
    }

    /// One chart per snapshot field, one series per run. Values pair with
    /// years by position, so runs of different lengths are fine.
    pub fn comparison_charts(
        &self,
        runs: &[RunRecord],
        stems: &mut FileStems,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ChartSpec> {
        let mut fields: Vec<String> = Vec::new();
        for run in runs {
            for snapshot in &run.summary {
                for (name, _) in snapshot.fields() {
                    if !fields.iter().any(|f| f == name) {
                        fields.push(name.to_string());
                    }
                }
            }
        }

        fields
            .iter()
            .map(|field| {
                let series = runs
                    .iter()
                    .map(|run| {
                        let points = run
                            .summary
                            .iter()
                            .enumerate()
                            .filter_map(|(idx, snapshot)| {
                                let year = year_at(self.window.start, idx)?;
                                snapshot
                                    .fields()
                                    .into_iter()
                                    .find(|(name, _)| name == field)
                                    .map(|(_, v)| (year, v))
                            })
                            .collect();
                        (run.label.clone(), points)
                    })
                    .collect();
                let mut spec = self.from_series(
                    &format!("{RUN_CHART_PREFIX}{field}"),
                    ChartKind::Line,
                    None,
                    series,
                );
                spec.file_stem = stems.claim(&spec.title, diagnostics);
                spec
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use crate::model::{Cell, YearSnapshot};
    use std::collections::BTreeMap;

    fn palette() -> Vec<String> {
        CalibrationConfig::default().style.palette
    }

    fn dataset(columns: &[&str]) -> TimeSeriesDataset {
        let mut dataset = TimeSeriesDataset::with_rows(2022, 3);
        for (idx, name) in columns.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let base = idx as f64;
            assert!(dataset.push_column(
                name,
                vec![Cell::Number(base), Cell::Number(base + 1.0), Cell::Missing]
            ));
        }
        dataset
    }

    #[test]
    fn missing_columns_warn_and_are_skipped() {
        let palette = palette();
        let builder = ChartSpecBuilder::new(&palette, 2022);
        let data = dataset(&["a", "b", "c", "d"]);
        let decl = ChartDecl::new("Six", ["a", "x", "b", "c", "y", "d"]);
        let mut diagnostics = Diagnostics::new();

        let spec = builder.build(&decl, &data, &mut diagnostics);

        assert_eq!(spec.series.len(), 4);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.missing_columns_for("Six"), 2);
        let labels: Vec<_> = spec.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c", "d"]);
        assert_eq!(spec.series[0].points, vec![(2022, 0.0), (2023, 1.0)]);
    }

    #[test]
    fn chart_with_no_columns_still_builds() {
        let palette = palette();
        let builder = ChartSpecBuilder::new(&palette, 2022);
        let decl = ChartDecl::new("Ghost", ["nope"]).with_range(AxisRange::at_least(0.0));
        let mut diagnostics = Diagnostics::new();
        let spec = builder.build(&decl, &dataset(&[]), &mut diagnostics);
        assert!(spec.series.is_empty());
        assert_eq!(spec.y, YBounds { min: 0.0, max: 1.0 });
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn window_is_always_one_hundred_years() {
        let palette = palette();
        let builder = ChartSpecBuilder::new(&palette, 2022);
        let spec = builder.build(
            &ChartDecl::new("a", ["a"]),
            &dataset(&["a"]),
            &mut Diagnostics::new(),
        );
        assert_eq!(spec.x, YearWindow { start: 2022, end: 2122 });
        assert_eq!(spec.x.width(), REPORT_WINDOW_YEARS);
    }

    #[test]
    fn styles_cycle_color_then_stroke() {
        let palette = palette();
        let builder = ChartSpecBuilder::new(&palette, 2022);
        let first = builder.style_for(0);
        let wrapped = builder.style_for(palette.len());
        assert_eq!(first.color, wrapped.color);
        assert_eq!(first.line, LineStyle::Solid);
        assert_eq!(wrapped.line, LineStyle::Dashed);
        assert_eq!(builder.style_for(palette.len() * 3 + 1).line, LineStyle::Dotted);
        assert_eq!(builder.style_for(palette.len() * 4).line, LineStyle::Solid);
        assert_ne!(builder.style_for(1).color, first.color);
    }

    #[test]
    fn bounds_mix_override_and_autoscale() {
        let auto = YBounds::resolve(None, [3.0, -1.0, 7.5]);
        assert_eq!(auto, YBounds { min: -1.0, max: 7.5 });
        let floor = YBounds::resolve(Some(AxisRange::at_least(0.0)), [3.0, 7.5]);
        assert_eq!(floor, YBounds { min: 0.0, max: 7.5 });
        let fixed = YBounds::resolve(Some(AxisRange::between(0.0, 1.0)), [3.0]);
        assert_eq!(fixed, YBounds { min: 0.0, max: 1.0 });
        let flat = YBounds::resolve(None, [2.0, 2.0]);
        assert_eq!(flat, YBounds { min: 2.0, max: 3.0 });
        let ceiling_below_data = YBounds::resolve(
            Some(AxisRange {
                min: None,
                max: Some(1.0),
            }),
            [5.0],
        );
        assert_eq!(ceiling_below_data, YBounds { min: 0.0, max: 1.0 });
    }

    #[test]
    fn file_stems_are_filesystem_safe() {
        assert_eq!(file_stem("Population (b)"), "Population _b_");
        assert_eq!(file_stem("Demand & Consumed"), "Demand _ Consumed");
        assert_eq!(file_stem("Process-Fuel-Mix Share"), "Process-Fuel-Mix Share");
        assert_eq!(file_stem("a/b\\c"), "a_b_c");
        assert_eq!(file_stem("  "), "chart");
    }

    #[test]
    fn colliding_titles_get_distinct_file_stems() {
        let mut stems = FileStems::new();
        let mut diagnostics = Diagnostics::new();
        assert_eq!(stems.claim("Population (b)", &mut diagnostics), "Population _b_");
        assert_eq!(stems.claim("Population [b]", &mut diagnostics), "Population _b__2");
        assert_eq!(stems.claim("Population {b}", &mut diagnostics), "Population _b__3");
        assert_eq!(stems.claim("population _b_", &mut diagnostics), "population _b__4");
        assert_eq!(stems.claim("Temperature", &mut diagnostics), "Temperature");
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::FileNameCollision { title, file_stem }
                if title == "Population [b]" && file_stem == "Population _b__2"
        )));
    }

    #[test]
    fn build_all_and_run_charts_share_one_namespace() {
        let palette = palette();
        let builder = ChartSpecBuilder::new(&palette, 2022);
        let mut groups = ChartGroupSpec::default();
        groups.insert("General", ChartDecl::new("Population (b)", ["a"]));
        groups.insert("General", ChartDecl::new("Population [b]", ["b"]));
        groups.insert("General", ChartDecl::new("runs__temp", ["a"]));
        let mut stems = FileStems::new();
        let mut diagnostics = Diagnostics::new();

        let data = dataset(&["a", "b"]);
        let charts = builder.build_all(&groups, &data, &mut stems, &mut diagnostics);
        let runs = vec![RunRecord {
            label: "1".to_string(),
            events: Vec::new(),
            summary: vec![YearSnapshot {
                temp: 1.0,
                emissions: 1.0,
                outlook: 1.0,
                extinction_rate: 1.0,
                habitability: 1.0,
                land_use: 1.0,
                extra: BTreeMap::from([
                    ("a(b)".to_string(), serde_json::json!(1.0)),
                    ("a[b]".to_string(), serde_json::json!(2.0)),
                ]),
            }],
        }];
        let comparisons = builder.comparison_charts(&runs, &mut stems, &mut diagnostics);

        let mut all: Vec<&str> = charts
            .iter()
            .chain(&comparisons)
            .map(|c| c.file_stem.as_str())
            .collect();
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
        assert_eq!(charts[1].file_stem, "Population _b__2");
        assert_eq!(comparisons[0].title, "runs__temp");
        assert_eq!(comparisons[0].file_stem, "runs__temp_2");
        assert_eq!(comparisons[6].file_stem, "runs__a_b_");
        assert_eq!(comparisons[7].file_stem, "runs__a_b__2");
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn window_end_saturates_at_the_integer_limit() {
        let window = YearWindow::starting_at(i32::MAX - 10);
        assert_eq!(window.end, i32::MAX);
        assert_eq!(window.width(), 10);
    }

    #[test]
    fn comparison_charts_have_one_series_per_run() {
        let snapshot = |temp: f64| YearSnapshot {
            temp,
            emissions: 1.0,
            outlook: 2.0,
            extinction_rate: 3.0,
            habitability: 4.0,
            land_use: 5.0,
            extra: BTreeMap::new(),
        };
        let runs = vec![
            RunRecord {
                label: "1".to_string(),
                events: Vec::new(),
                summary: vec![snapshot(1.0), snapshot(1.5)],
            },
            RunRecord {
                label: "2".to_string(),
                events: Vec::new(),
                summary: vec![snapshot(2.0)],
            },
        ];
        let palette = palette();
        let mut diagnostics = Diagnostics::new();
        let charts = ChartSpecBuilder::new(&palette, 2022).comparison_charts(
            &runs,
            &mut FileStems::new(),
            &mut diagnostics,
        );
        assert_eq!(charts.len(), 6);
        assert!(diagnostics.is_empty());
        let temp = &charts[0];
        assert_eq!(temp.title, "runs__temp");
        assert_eq!(temp.series.len(), 2);
        assert_eq!(temp.series[0].points, vec![(2022, 1.0), (2023, 1.5)]);
        assert_eq!(temp.series[1].points, vec![(2022, 2.0)]);
        assert_eq!(temp.x.width(), REPORT_WINDOW_YEARS);
    }
}
