//! Event occurrence statistics across a calibration ensemble.
//!
//! Each run is tallied on its own ([`RunTally`]) and the partial results are
//! merged into an [`EnsembleTally`]; nothing is shared between runs until the
//! merge, so runs can be tallied in any order or in parallel.
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::{Diagnostic, Diagnostics};
use crate::model::{EventCatalog, RunRecord, year_at};

/// Occurrences of one event within one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct RunEventCounts {
    per_year: BTreeMap<i32, u64>,
    total: u64,
}

/// Partial aggregate for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunTally {
    order: Vec<String>,
    events: HashMap<String, RunEventCounts>,
}

impl RunTally {
    /// Count every occurrence; year `i` of the run is `start_year + i`.
    #[must_use]
    pub fn from_run(run: &RunRecord, start_year: i32) -> Self {
        let mut tally = Self::default();
        for (offset, year_events) in run.events.iter().enumerate() {
            let Some(year) = year_at(start_year, offset) else {
                break;
            };
            for event in year_events {
                if !tally.events.contains_key(&event.name) {
                    tally.order.push(event.name.clone());
                }
                let counts = tally.events.entry(event.name.clone()).or_default();
                *counts.per_year.entry(year).or_insert(0) += 1;
                counts.total += 1;
            }
        }
        tally
    }

    /// Distinct event names seen in this run, in first-seen order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }
}

/// Accumulated counts for one event across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EventAccumulator {
    name: String,
    total: u64,
    runs_with_event: usize,
    per_year: BTreeMap<i32, u64>,
}

/// Ensemble-wide aggregate built by merging run tallies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnsembleTally {
    n_runs: usize,
    events: Vec<EventAccumulator>,
    lookup: HashMap<String, usize>,
}

impl EnsembleTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one run in. Each distinct event adds one to its run count no
    /// matter how often it occurred in the run.
    pub fn merge(&mut self, run: RunTally) {
        self.n_runs += 1;
        let RunTally { order, mut events } = run;
        for name in order {
            let Some(counts) = events.remove(&name) else {
                continue;
            };
            let idx = if let Some(&idx) = self.lookup.get(&name) {
                idx
            } else {
                self.lookup.insert(name.clone(), self.events.len());
                self.events.push(EventAccumulator {
                    name,
                    total: 0,
                    runs_with_event: 0,
                    per_year: BTreeMap::new(),
                });
                self.events.len() - 1
            };
            let acc = &mut self.events[idx];
            acc.total += counts.total;
            acc.runs_with_event += 1;
            for (year, count) in counts.per_year {
                *acc.per_year.entry(year).or_insert(0) += count;
            }
        }
    }

    #[must_use]
    pub const fn n_runs(&self) -> usize {
        self.n_runs
    }

    /// Rank and normalize. Events are ordered by descending total
    /// occurrences; ties keep discovery order.
    #[must_use]
    pub fn finish(self, catalog: &EventCatalog, diagnostics: &mut Diagnostics) -> EnsembleStats {
        let n_runs = self.n_runs;
        let mut uncatalogued = Vec::new();
        let mut distributions: Vec<EventDistribution> = Vec::with_capacity(self.events.len());
        for acc in self.events {
            if acc.total == 0 {
                continue;
            }
            if !catalog.contains(&acc.name) {
                diagnostics.push(Diagnostic::UncataloguedEvent {
                    name: acc.name.clone(),
                });
                uncatalogued.push(acc.name.clone());
            }
            if let Some(dist) = EventDistribution::from_counts(acc, n_runs) {
                distributions.push(dist);
            }
        }
        distributions.sort_by(|a, b| b.total.cmp(&a.total));

        EnsembleStats {
            n_runs,
            total_possible: catalog.total_possible(),
            total_observed: distributions.len(),
            distributions,
            uncatalogued,
        }
    }
}

/// Statistics for one event across the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDistribution {
    pub name: String,
    /// Raw occurrences across every run and year.
    pub total: u64,
    /// Runs with at least one occurrence.
    pub runs_with_event: usize,
    /// `100 * runs_with_event / n_runs`.
    pub percent_of_runs: f64,
    pub min_year: i32,
    pub max_year: i32,
    /// First year holding the maximum per-year count.
    pub peak_year: i32,
    pub per_year: BTreeMap<i32, u64>,
    /// One value per year from `min_year` to `max_year`, each divided by this
    /// event's own maximum per-year count.
    pub profile: Vec<f64>,
}

impl EventDistribution {
    fn from_counts(acc: EventAccumulator, n_runs: usize) -> Option<Self> {
        let (&min_year, _) = acc.per_year.first_key_value()?;
        let (&max_year, _) = acc.per_year.last_key_value()?;
        let max_count = acc.per_year.values().copied().max()?;
        let peak_year = acc
            .per_year
            .iter()
            .find(|(_, count)| **count == max_count)
            .map_or(min_year, |(year, _)| *year);

        #[allow(clippy::cast_precision_loss)]
        let profile = (min_year..=max_year)
            .map(|year| acc.per_year.get(&year).copied().unwrap_or(0) as f64 / max_count as f64)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let percent_of_runs = if n_runs == 0 {
            0.0
        } else {
            acc.runs_with_event as f64 / n_runs as f64 * 100.0
        };

        Some(Self {
            name: acc.name,
            total: acc.total,
            runs_with_event: acc.runs_with_event,
            percent_of_runs,
            min_year,
            max_year,
            peak_year,
            per_year: acc.per_year,
            profile,
        })
    }

    /// Fraction of runs containing the event, in `[0, 1]`, for color mapping.
    #[must_use]
    pub fn run_fraction(&self) -> f64 {
        self.percent_of_runs / 100.0
    }
}

/// Output of the event distribution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleStats {
    pub n_runs: usize,
    pub total_possible: usize,
    /// Distinct events with at least one occurrence.
    pub total_observed: usize,
    /// Ranked by descending total occurrences.
    pub distributions: Vec<EventDistribution>,
    /// Observed events missing from the catalog, in discovery order.
    pub uncatalogued: Vec<String>,
}

impl EnsembleStats {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EventDistribution> {
        self.distributions.iter().find(|d| d.name == name)
    }
}

/// Computes [`EnsembleStats`] for a set of calibration runs.
#[derive(Debug, Clone, Copy)]
pub struct EventDistributionEngine {
    start_year: i32,
}

impl EventDistributionEngine {
    #[must_use]
    pub const fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    #[must_use]
    pub fn tally(&self, run: &RunRecord) -> RunTally {
        RunTally::from_run(run, self.start_year)
    }

    pub fn compute(
        &self,
        runs: &[RunRecord],
        catalog: &EventCatalog,
        diagnostics: &mut Diagnostics,
    ) -> EnsembleStats {
        let mut ensemble = EnsembleTally::new();
        for run in runs {
            ensemble.merge(self.tally(run));
        }
        ensemble.finish(catalog, diagnostics)
    }
}
