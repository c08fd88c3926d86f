//! Merging derived columns into the primary dataset and grouping columns
//! into charts.
//!
//! Column classification runs in two passes: [`ColumnIndex::build`] parses
//! names following the `<Output>:<Process>:<Category>` and `Feedstock:<name>`
//! conventions into typed entries, then [`ChartGroupSpec::resolve`] derives
//! chart declarations from that index and the static configuration.
use std::collections::{BTreeMap, HashMap};

use crate::config::{
    AxisRange, CalibrationConfig, ChartDecl, ChartKind, EVENTS_GROUP, FEEDSTOCK_GROUP,
    OUTLOOK_GROUP, PROCESS_GROUP,
};
use crate::error::{Diagnostic, Diagnostics};
use crate::model::{Cell, TimeSeriesDataset, YearEvents};

const FEEDSTOCK_PREFIX: &str = "Feedstock";
const MIX_SHARE_CATEGORY: &str = "Mix Share";
const OUTLOOK_PREFIX: &str = "Outlook";

/// Icon-event names that get a count column: configured names first, then
/// names discovered in the log in first-seen order.
#[must_use]
pub fn icon_event_universe(config: &CalibrationConfig, icon_log: &[YearEvents]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let declared = config
        .icon_event_groups
        .iter()
        .flat_map(|group| group.events.iter());
    let observed = icon_log.iter().flatten().map(|event| &event.name);
    for name in declared.chain(observed) {
        if !names.iter().any(|existing| existing == name) {
            names.push(name.clone());
        }
    }
    names
}

/// Per-year occurrence counts for a fixed list of icon events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconEventCounts {
    names: Vec<String>,
    /// `counts[name_idx][year_idx]`
    counts: Vec<Vec<u32>>,
}

impl IconEventCounts {
    /// Count occurrences per year for `names` over `years` rows. Log entries
    /// past `years` are ignored; names outside `names` are not counted.
    #[must_use]
    pub fn tally(names: &[String], icon_log: &[YearEvents], years: usize) -> Self {
        let position: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();
        let mut counts = vec![vec![0_u32; years]; names.len()];
        for (year_idx, year) in icon_log.iter().take(years).enumerate() {
            for event in year {
                if let Some(&idx) = position.get(event.name.as_str()) {
                    counts[idx][year_idx] += 1;
                }
            }
        }
        Self {
            names: names.to_vec(),
            counts,
        }
    }

    #[must_use]
    pub fn count(&self, name: &str, year_idx: usize) -> Option<u32> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.counts[idx].get(year_idx).copied()
    }

    fn into_columns(self) -> impl Iterator<Item = (String, Vec<u32>)> {
        self.names.into_iter().zip(self.counts)
    }
}

/// Per-year icon-event summaries, `"<count>x <name>"` in first-seen order.
#[must_use]
pub fn icon_event_lines(year: &YearEvents) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for event in year {
        let counter = counts.entry(event.name.as_str()).or_insert_with(|| {
            order.push(event.name.as_str());
            0
        });
        *counter += 1;
    }
    order
        .into_iter()
        .map(|name| format!("{}x {name}", counts[name]))
        .collect()
}

/// Builds the merged dataset and the chart grouping for one report.
#[derive(Debug, Clone, Copy)]
pub struct SeriesAggregator<'a> {
    config: &'a CalibrationConfig,
}

impl<'a> SeriesAggregator<'a> {
    #[must_use]
    pub const fn new(config: &'a CalibrationConfig) -> Self {
        Self { config }
    }

    /// Left-join one zero-filled count column per icon event onto the
    /// dataset by year index. Row count and order are unchanged.
    #[must_use]
    pub fn merge(
        &self,
        mut dataset: TimeSeriesDataset,
        icon_log: &[YearEvents],
        diagnostics: &mut Diagnostics,
    ) -> TimeSeriesDataset {
        let rows = dataset.len();
        if icon_log.len() > rows {
            diagnostics.push(Diagnostic::IconLogOverflow {
                extra_years: icon_log.len() - rows,
            });
        }
        let names = icon_event_universe(self.config, icon_log);
        let counts = IconEventCounts::tally(&names, icon_log, rows);
        for (name, column) in counts.into_columns() {
            let values = column.into_iter().map(|c| Cell::Number(f64::from(c))).collect();
            if !dataset.push_column(&name, values) {
                diagnostics.push(Diagnostic::ColumnCollision { column: name });
            }
        }
        dataset
    }

    /// Classify the dataset's columns and build the full chart grouping.
    #[must_use]
    pub fn chart_groups(&self, dataset: &TimeSeriesDataset) -> ChartGroupSpec {
        let index = ColumnIndex::build(dataset.column_names(), &self.config.process_outputs);
        ChartGroupSpec::resolve(self.config, &index)
    }
}

/// A column following `<Output>:<Process>:<Category>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessColumn {
    pub output: String,
    pub process: String,
    pub category: String,
    pub column: String,
}

/// A column following `Feedstock:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedstockColumn {
    pub name: String,
    pub column: String,
}

/// Columns of one category for one output, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryColumns {
    pub category: String,
    pub columns: Vec<String>,
}

/// Categories seen for one output, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCategories {
    pub output: String,
    pub categories: Vec<CategoryColumns>,
}

impl OutputCategories {
    fn insert(&mut self, category: &str, column: &str) {
        if let Some(existing) = self.categories.iter_mut().find(|c| c.category == category) {
            existing.columns.push(column.to_string());
        } else {
            self.categories.push(CategoryColumns {
                category: category.to_string(),
                columns: vec![column.to_string()],
            });
        }
    }
}

/// Typed view of the columns that follow a naming convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    pub processes: Vec<ProcessColumn>,
    pub feedstocks: Vec<FeedstockColumn>,
}

impl ColumnIndex {
    /// First pass: parse column names. Process columns are only recognised
    /// for the configured outputs.
    pub fn build<'c, I>(columns: I, outputs: &[String]) -> Self
    where
        I: IntoIterator<Item = &'c str>,
    {
        let mut index = Self::default();
        for column in columns {
            let parts: Vec<&str> = column.split(':').collect();
            match parts.as_slice() {
                [FEEDSTOCK_PREFIX, name] if !name.is_empty() => {
                    index.feedstocks.push(FeedstockColumn {
                        name: (*name).to_string(),
                        column: column.to_string(),
                    });
                }
                [output, process, category] if outputs.iter().any(|o| o.as_str() == *output) => {
                    index.processes.push(ProcessColumn {
                        output: (*output).to_string(),
                        process: (*process).to_string(),
                        category: (*category).to_string(),
                        column: column.to_string(),
                    });
                }
                _ => {}
            }
        }
        index
    }

    /// Process columns grouped by output, then category.
    #[must_use]
    pub fn by_output(&self) -> Vec<OutputCategories> {
        let mut grouped: Vec<OutputCategories> = Vec::new();
        for entry in &self.processes {
            let slot = if let Some(pos) = grouped.iter().position(|g| g.output == entry.output) {
                pos
            } else {
                grouped.push(OutputCategories {
                    output: entry.output.clone(),
                    categories: Vec::new(),
                });
                grouped.len() - 1
            };
            grouped[slot].insert(&entry.category, &entry.column);
        }
        grouped
    }

    /// Second pass: synthesized process charts.
    #[must_use]
    pub fn process_charts(&self) -> Vec<ChartDecl> {
        self.by_output()
            .into_iter()
            .flat_map(|output| {
                let name = output.output;
                output.categories.into_iter().map(move |cat| {
                    let chart =
                        ChartDecl::new(format!("Process-{name}-{}", cat.category), cat.columns);
                    if cat.category == MIX_SHARE_CATEGORY {
                        chart.with_range(AxisRange::between(0.0, 1.0))
                    } else {
                        chart
                    }
                })
            })
            .collect()
    }

    /// Second pass: one single-column chart per feedstock.
    #[must_use]
    pub fn feedstock_charts(&self) -> Vec<ChartDecl> {
        self.feedstocks
            .iter()
            .map(|feedstock| {
                ChartDecl::new(
                    format!("{FEEDSTOCK_PREFIX}-{}", feedstock.name),
                    [feedstock.column.clone()],
                )
                .with_range(AxisRange::at_least(0.0))
            })
            .collect()
    }
}

/// A named tab of chart titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartGroup {
    pub name: String,
    pub titles: Vec<String>,
}

/// Resolved grouping: ordered groups plus a declaration for every title.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartGroupSpec {
    groups: Vec<ChartGroup>,
    charts: BTreeMap<String, ChartDecl>,
}

impl ChartGroupSpec {
    /// Static groups from the configuration, extended with icon-event,
    /// regional, process and feedstock charts.
    #[must_use]
    pub fn resolve(config: &CalibrationConfig, index: &ColumnIndex) -> Self {
        let mut spec = Self::default();
        for decl in &config.charts {
            spec.charts.insert(decl.title.clone(), decl.clone());
        }
        for group in &config.groups {
            for title in &group.charts {
                spec.add_to_group(&group.name, title);
            }
        }

        for icon_group in &config.icon_event_groups {
            let decl = ChartDecl::new(icon_group.title.clone(), icon_group.events.clone());
            spec.insert(EVENTS_GROUP, decl);
        }
        for region_group in &config.region_groups {
            let columns = region_group
                .regions
                .iter()
                .map(|region| format!("{OUTLOOK_PREFIX}:{region}"));
            let decl = ChartDecl::new(region_group.title.clone(), columns)
                .with_range(config.region_range);
            spec.insert(OUTLOOK_GROUP, decl);
        }
        for decl in index.process_charts() {
            spec.insert(PROCESS_GROUP, decl);
        }
        for decl in index.feedstock_charts() {
            spec.insert(FEEDSTOCK_GROUP, decl);
        }
        spec
    }

    /// Register a chart and append its title to `group`.
    pub fn insert(&mut self, group: &str, decl: ChartDecl) {
        let title = decl.title.clone();
        self.charts.insert(title.clone(), decl);
        self.add_to_group(group, &title);
    }

    fn add_to_group(&mut self, group: &str, title: &str) {
        let slot = if let Some(pos) = self.groups.iter().position(|g| g.name == group) {
            pos
        } else {
            self.groups.push(ChartGroup {
                name: group.to_string(),
                titles: Vec::new(),
            });
            self.groups.len() - 1
        };
        let titles = &mut self.groups[slot].titles;
        if !titles.iter().any(|t| t == title) {
            titles.push(title.to_string());
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[ChartGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ChartGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Declaration for a title. A title listed in a group without its own
    /// declaration plots the column of the same name.
    #[must_use]
    pub fn declaration(&self, title: &str) -> ChartDecl {
        self.charts
            .get(title)
            .cloned()
            .unwrap_or_else(|| ChartDecl::new(title, [title]))
    }

    /// Every distinct title in group order.
    #[must_use]
    pub fn titles(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for group in &self.groups {
            for title in &group.titles {
                if !seen.contains(&title.as_str()) {
                    seen.push(title);
                }
            }
        }
        seen
    }

    #[must_use]
    pub fn kind_of(&self, title: &str) -> ChartKind {
        self.charts.get(title).map_or(ChartKind::Line, |c| c.kind)
    }
}
