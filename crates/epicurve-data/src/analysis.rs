//! Main processing pipeline.
//!
//! Chains selection validation, aggregation, optional trigger alignment and
//! optional per-capita normalization, returning a [`ProcessedTable`] ready
//! for rendering.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{NaiveDate, Utc};
use epicurve_core::defaults::{DEFAULT_POPULATION_SIZE, DEFAULT_THRESHOLD};
use epicurve_core::models::{
    AggregatedSeries, AlignedSeries, EntitySelection, Metric, NormalizedSeries, Observation,
};
use epicurve_core::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::EntityAggregator;
use crate::export;
use crate::population::{PopulationNormalizer, PopulationReference};
use crate::trigger::{reindex, TriggerAligner};

// ── Public types ──────────────────────────────────────────────────────────────

/// Parameters of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub selection: EntitySelection,
    /// Metric the trigger threshold applies to.
    pub metric: Metric,
    pub threshold: u64,
    /// When `false` the calendar date axis is kept.
    pub align: bool,
    /// Population size per-capita values are expressed against.
    pub population_size: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            selection: EntitySelection::default(),
            metric: Metric::Cases,
            threshold: DEFAULT_THRESHOLD,
            align: true,
            population_size: DEFAULT_POPULATION_SIZE,
        }
    }
}

/// Output table of the pipeline, by index axis and value kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedTable {
    Calendar(AggregatedSeries),
    CalendarPerCapita(NormalizedSeries<NaiveDate>),
    Aligned(AlignedSeries),
    AlignedPerCapita(NormalizedSeries<i64>),
}

impl ProcessedTable {
    /// Name of the index column.
    pub fn index_label(&self) -> &'static str {
        match self {
            ProcessedTable::Calendar(_) | ProcessedTable::CalendarPerCapita(_) => "date",
            ProcessedTable::Aligned(_) | ProcessedTable::AlignedPerCapita(_) => "days",
        }
    }

    pub fn is_per_capita(&self) -> bool {
        matches!(
            self,
            ProcessedTable::CalendarPerCapita(_) | ProcessedTable::AlignedPerCapita(_)
        )
    }

    pub fn entity_count(&self) -> usize {
        match self {
            ProcessedTable::Calendar(s) => s.len(),
            ProcessedTable::CalendarPerCapita(s) => s.len(),
            ProcessedTable::Aligned(s) => s.len(),
            ProcessedTable::AlignedPerCapita(s) => s.len(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            ProcessedTable::Calendar(s) => s.row_count(),
            ProcessedTable::CalendarPerCapita(s) => s.row_count(),
            ProcessedTable::Aligned(s) => s.row_count(),
            ProcessedTable::AlignedPerCapita(s) => s.row_count(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let label = self.index_label();
        match self {
            ProcessedTable::Calendar(s) => export::write_csv(writer, label, s),
            ProcessedTable::CalendarPerCapita(s) => export::write_csv(writer, label, s),
            ProcessedTable::Aligned(s) => export::write_csv(writer, label, s),
            ProcessedTable::AlignedPerCapita(s) => export::write_csv(writer, label, s),
        }
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let label = self.index_label();
        match self {
            ProcessedTable::Calendar(s) => export::write_json(writer, label, s),
            ProcessedTable::CalendarPerCapita(s) => export::write_json(writer, label, s),
            ProcessedTable::Aligned(s) => export::write_json(writer, label, s),
            ProcessedTable::AlignedPerCapita(s) => export::write_json(writer, label, s),
        }
    }
}

/// Metadata produced alongside the table.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub rows_read: usize,
    /// Entities present after aggregation.
    pub entities_aggregated: usize,
    /// Entities present in the final table.
    pub entities_output: usize,
    pub rows_output: usize,
    /// Trigger date per aligned entity; empty when alignment is off.
    pub trigger_dates: BTreeMap<String, NaiveDate>,
    /// Entities dropped because the metric never reached the threshold.
    pub excluded_entities: Vec<String>,
    /// Selected names that matched no rows.
    pub unmatched_names: Vec<String>,
    pub per_capita: bool,
}

/// The complete output of [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub table: ProcessedTable,
    pub report: PipelineReport,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full processing pipeline.
///
/// 1. Check the entity lists are pairwise disjoint.
/// 2. Aggregate raw rows into one series per entity.
/// 3. When `options.align`, re-index each entity on its trigger date.
/// 4. When `population` is given, rescale to per-capita values.
///
/// Any failure aborts the run; no partial table is returned.
pub fn run_pipeline(
    observations: &[Observation],
    population: Option<&PopulationReference>,
    options: &PipelineOptions,
) -> Result<PipelineResult> {
    // ── Step 1: Validate selection ────────────────────────────────────────────
    options.selection.validate()?;

    // ── Step 2: Aggregate ─────────────────────────────────────────────────────
    let aggregated = EntityAggregator::aggregate(observations, &options.selection);
    let entities_aggregated = aggregated.len();
    let unmatched_names = unmatched_names(&options.selection, &aggregated);
    for name in &unmatched_names {
        warn!("No rows matched selected entity {}", name);
    }
    for (state, country) in nested_promoted_states(observations, &options.selection) {
        warn!(
            "Promoted state {} is also counted in multi-state country {}",
            state, country
        );
    }

    // ── Step 3: Align ─────────────────────────────────────────────────────────
    let mut trigger_dates = BTreeMap::new();
    let mut excluded_entities = Vec::new();
    let aligned = if options.align {
        let aligner = TriggerAligner::new(options.metric, options.threshold);
        trigger_dates = aligner.trigger_dates(&aggregated)?;
        excluded_entities = aggregated
            .entity_names()
            .filter(|name| !trigger_dates.contains_key(*name))
            .map(str::to_string)
            .collect();
        Some(reindex(&aggregated, &trigger_dates))
    } else {
        None
    };

    // ── Step 4: Normalize ─────────────────────────────────────────────────────
    let table = match (aligned, population) {
        (Some(aligned), Some(reference)) => ProcessedTable::AlignedPerCapita(
            PopulationNormalizer::new(reference, options.population_size).normalize(&aligned)?,
        ),
        (Some(aligned), None) => ProcessedTable::Aligned(aligned),
        (None, Some(reference)) => ProcessedTable::CalendarPerCapita(
            PopulationNormalizer::new(reference, options.population_size)
                .normalize(&aggregated)?,
        ),
        (None, None) => ProcessedTable::Calendar(aggregated),
    };

    // ── Step 5: Build result ──────────────────────────────────────────────────
    let report = PipelineReport {
        generated_at: Utc::now().to_rfc3339(),
        rows_read: observations.len(),
        entities_aggregated,
        entities_output: table.entity_count(),
        rows_output: table.row_count(),
        trigger_dates,
        excluded_entities,
        unmatched_names,
        per_capita: table.is_per_capita(),
    };

    info!(
        "Pipeline produced {} rows for {} entities ({} excluded)",
        report.rows_output,
        report.entities_output,
        report.excluded_entities.len()
    );

    Ok(PipelineResult { table, report })
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Selected names with no series after aggregation, in name order.
fn unmatched_names(selection: &EntitySelection, aggregated: &AggregatedSeries) -> Vec<String> {
    let mut names: Vec<String> = selection
        .mainland
        .iter()
        .chain(&selection.multistate)
        .chain(&selection.promoted_states)
        .filter(|name| !aggregated.contains(name))
        .cloned()
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Promoted states whose rows also feed a selected multi-state country, as
/// `(state, country)` pairs in name order.
fn nested_promoted_states(
    observations: &[Observation],
    selection: &EntitySelection,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = observations
        .iter()
        .filter(|o| selection.multistate.contains(&o.country))
        .filter_map(|o| {
            o.state
                .as_deref()
                .filter(|state| selection.promoted_states.contains(*state))
                .map(|state| (state.to_string(), o.country.clone()))
        })
        .collect();
    pairs.sort();
    pairs.dedup();
    pairs
}

// ── Tests ─────────────────────────────────────────────────────────────────────
