//! Threshold-triggered realignment of entity series.
//!
//! Each entity's calendar axis is replaced by "days since the metric first
//! reached the threshold", so that curves with different onsets can be
//! compared day by day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use epicurve_core::models::{AggregatedSeries, AlignedSeries, Metric, Point};
use epicurve_core::{EpicurveError, Result};
use tracing::{debug, info};

// ── TriggerAligner ────────────────────────────────────────────────────────────

/// Finds trigger dates for one metric/threshold pair and re-indexes series
/// against them.
#[derive(Debug, Clone, Copy)]
pub struct TriggerAligner {
    metric: Metric,
    threshold: u64,
}

impl TriggerAligner {
    pub fn new(metric: Metric, threshold: u64) -> Self {
        Self { metric, threshold }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Earliest date per entity on which the metric meets the threshold.
    ///
    /// Entities that never reach it are left out of the map; that is not an
    /// error. An entity with no reported value at all for the metric is a
    /// [`EpicurveError::MissingColumn`].
    pub fn trigger_dates(&self, series: &AggregatedSeries) -> Result<BTreeMap<String, NaiveDate>> {
        let mut dates = BTreeMap::new();
        for (entity, points) in series.iter() {
            match self.entity_trigger(entity, points)? {
                Some(date) => {
                    dates.insert(entity.to_string(), date);
                }
                None => {
                    info!(
                        "{} never reaches {} {}; excluded from aligned output",
                        entity, self.threshold, self.metric
                    );
                }
            }
        }
        Ok(dates)
    }

    /// Drop pre-trigger rows and replace dates with whole-day offsets.
    pub fn align(&self, series: &AggregatedSeries) -> Result<AlignedSeries> {
        let triggers = self.trigger_dates(series)?;
        Ok(reindex(series, &triggers))
    }

    fn entity_trigger(&self, entity: &str, points: &[Point<NaiveDate>]) -> Result<Option<NaiveDate>> {
        if !points.is_empty() && points.iter().all(|p| p.metric(self.metric).is_none()) {
            return Err(EpicurveError::MissingColumn(format!(
                "{} (no values for {})",
                self.metric, entity
            )));
        }

        // A row without a value never satisfies the threshold.
        Ok(points
            .iter()
            .filter(|p| p.metric(self.metric).is_some_and(|v| v >= self.threshold))
            .map(|p| p.index)
            .min())
    }
}

// ── Free functions ────────────────────────────────────────────────────────────

/// Re-index `series` against precomputed trigger dates.
///
/// Entities without a trigger date are dropped; rows strictly before the
/// trigger are dropped; the rest are indexed by `date - trigger` in days and
/// kept in offset order.
pub fn reindex(series: &AggregatedSeries, triggers: &BTreeMap<String, NaiveDate>) -> AlignedSeries {
    let mut aligned = AlignedSeries::new();

    for (entity, points) in series.iter() {
        let Some(trigger) = triggers.get(entity) else {
            continue;
        };
        let mut shifted: Vec<Point<i64>> = points
            .iter()
            .filter(|p| p.index >= *trigger)
            .map(|p| Point {
                index: (p.index - *trigger).num_days(),
                cases: p.cases,
                deaths: p.deaths,
                recovered: p.recovered,
            })
            .collect();
        shifted.sort_by_key(|p| p.index);

        debug!(
            "{}: trigger {} keeps {} of {} rows",
            entity,
            trigger,
            shifted.len(),
            points.len()
        );
        aligned.insert(entity, shifted);
    }

    aligned
}

/// Trigger date per entity for `metric >= threshold`.
pub fn compute_trigger_dates(
    series: &AggregatedSeries,
    metric: Metric,
    threshold: u64,
) -> Result<BTreeMap<String, NaiveDate>> {
    TriggerAligner::new(metric, threshold).trigger_dates(series)
}

/// Align every entity of `series` on its own trigger date.
pub fn align(series: &AggregatedSeries, metric: Metric, threshold: u64) -> Result<AlignedSeries> {
    TriggerAligner::new(metric, threshold).align(series)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
