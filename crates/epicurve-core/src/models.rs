use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{EpicurveError, Result};

/// One row of the raw observation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Country (or region) the row was reported for.
    pub country: String,
    /// Sub-national state, `None` for country-level rows.
    #[serde(default)]
    pub state: Option<String>,
    /// Calendar day of the report.
    pub date: NaiveDate,
    /// Cumulative confirmed cases.
    pub cases: u64,
    /// Cumulative deaths.
    pub deaths: u64,
    /// Cumulative recoveries, when the provider reports them.
    #[serde(default)]
    pub recovered: Option<u64>,
}

impl Observation {
    /// `true` when the row is a country-level row: no state, or a state
    /// named after the country itself.
    pub fn is_country_level(&self) -> bool {
        match self.state.as_deref() {
            None => true,
            Some(state) => state == self.country,
        }
    }

    /// `true` when the row carries the given state name. Rows without a
    /// state never match.
    pub fn has_state(&self, name: &str) -> bool {
        self.state.as_deref() == Some(name)
    }
}

// ── Metric ────────────────────────────────────────────────────────────────────

/// Count column a trigger threshold is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cases,
    Deaths,
    Recovered,
}

impl FromStr for Metric {
    type Err = EpicurveError;

    /// Case-insensitive; `"confirmed"` is accepted as a synonym for cases.
    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "cases" | "confirmed" => Ok(Metric::Cases),
            "deaths" => Ok(Metric::Deaths),
            "recovered" => Ok(Metric::Recovered),
            other => Err(EpicurveError::Config(format!("unknown metric: {other}"))),
        }
    }
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cases => "cases",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Point / Series ────────────────────────────────────────────────────────────

/// One row of an entity series.
///
/// `X` is the index axis (a calendar date or a day offset) and `V` the type
/// of the case and death columns (raw counts or per-capita rates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point<X, V = u64> {
    pub index: X,
    pub cases: V,
    pub deaths: V,
    pub recovered: Option<u64>,
}

impl<X> Point<X, u64> {
    /// Value of `metric` for this row. `None` only for an unreported
    /// recovered count.
    pub fn metric(&self, metric: Metric) -> Option<u64> {
        match metric {
            Metric::Cases => Some(self.cases),
            Metric::Deaths => Some(self.deaths),
            Metric::Recovered => self.recovered,
        }
    }
}

/// Per-entity series keyed by entity name, iterated in name order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<X, V = u64> {
    entities: BTreeMap<String, Vec<Point<X, V>>>,
}

/// Aggregated counts indexed by calendar date.
pub type AggregatedSeries = Series<NaiveDate, u64>;

/// Counts indexed by days since each entity's trigger date.
pub type AlignedSeries = Series<i64, u64>;

/// Per-capita rates over either axis.
pub type NormalizedSeries<X> = Series<X, f64>;

impl<X, V> Default for Series<X, V> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }
}

impl<X, V> Series<X, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `points` to `entity`, creating it when absent.
    pub fn extend_entity(&mut self, entity: impl Into<String>, points: Vec<Point<X, V>>) {
        self.entities.entry(entity.into()).or_default().extend(points);
    }

    /// Replace the rows of `entity`.
    pub fn insert(&mut self, entity: impl Into<String>, points: Vec<Point<X, V>>) {
        self.entities.insert(entity.into(), points);
    }

    pub fn get(&self, entity: &str) -> Option<&[Point<X, V>]> {
        self.entities.get(entity).map(Vec::as_slice)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Point<X, V>])> {
        self.entities
            .iter()
            .map(|(name, points)| (name.as_str(), points.as_slice()))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Total number of rows across all entities.
    pub fn row_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    /// Flatten into rows grouped by entity.
    pub fn rows(&self) -> impl Iterator<Item = SeriesRow<'_, X, V>> {
        self.entities.iter().flat_map(|(name, points)| {
            points.iter().map(move |p| SeriesRow {
                index: &p.index,
                country: name.as_str(),
                cases: &p.cases,
                deaths: &p.deaths,
                recovered: p.recovered,
            })
        })
    }
}

impl<X: Ord, V> Series<X, V> {
    /// Stable-sort each entity's rows by index.
    pub fn sort_by_index(&mut self) {
        for points in self.entities.values_mut() {
            points.sort_by(|a, b| a.index.cmp(&b.index));
        }
    }
}

/// Borrowed, flattened view of one series row in output column order.
#[derive(Debug, Serialize)]
pub struct SeriesRow<'a, X, V> {
    pub index: &'a X,
    pub country: &'a str,
    pub cases: &'a V,
    pub deaths: &'a V,
    pub recovered: Option<u64>,
}

// ── EntitySelection ───────────────────────────────────────────────────────────

/// Caller-supplied entity lists, one per selection policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySelection {
    /// Countries kept as-is, country-level rows only.
    #[serde(default)]
    pub mainland: BTreeSet<String>,
    /// Countries whose state rows are summed per date.
    #[serde(default)]
    pub multistate: BTreeSet<String>,
    /// States promoted to entities of their own.
    #[serde(default)]
    pub promoted_states: BTreeSet<String>,
}

impl EntitySelection {
    pub fn new<I, J, K, S>(mainland: I, multistate: J, promoted_states: K) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mainland: mainland.into_iter().map(Into::into).collect(),
            multistate: multistate.into_iter().map(Into::into).collect(),
            promoted_states: promoted_states.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mainland.is_empty() && self.multistate.is_empty() && self.promoted_states.is_empty()
    }

    /// Check that no name appears in two categories.
    ///
    /// Returns [`EpicurveError::OverlappingEntity`] for the first shared name
    /// in alphabetical order.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            (&self.mainland, &self.multistate),
            (&self.mainland, &self.promoted_states),
            (&self.multistate, &self.promoted_states),
        ];
        let first_shared = pairs
            .iter()
            .filter_map(|(a, b)| a.intersection(b).next())
            .min();
        match first_shared {
            Some(name) => Err(EpicurveError::OverlappingEntity(name.clone())),
            None => Ok(()),
        }
    }
}
