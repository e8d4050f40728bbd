//! Entity selection and aggregation of raw observations.
//!
//! Turns the raw per-region rows into one date-ascending series per analysis
//! entity, following one of three policies per entity name:
//!
//! * mainland: the country's own rows, state-level rows ignored;
//! * multi-state: every row of the country summed per date;
//! * promoted state: one state's rows under the state's name.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use epicurve_core::models::{AggregatedSeries, EntitySelection, Observation, Point};
use tracing::debug;

// ── DailyCounts ───────────────────────────────────────────────────────────────

/// Running per-date totals for one summed entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCounts {
    pub cases: u64,
    pub deaths: u64,
    pub recovered: Option<u64>,
}

impl DailyCounts {
    /// Add a single observation's counts. Recovered stays `None` until some
    /// contributing row reports it.
    pub fn add_observation(&mut self, obs: &Observation) {
        self.cases += obs.cases;
        self.deaths += obs.deaths;
        if let Some(r) = obs.recovered {
            self.recovered = Some(self.recovered.unwrap_or(0) + r);
        }
    }

    fn into_point(self, date: NaiveDate) -> Point<NaiveDate> {
        Point {
            index: date,
            cases: self.cases,
            deaths: self.deaths,
            recovered: self.recovered,
        }
    }
}

fn point_of(obs: &Observation) -> Point<NaiveDate> {
    Point {
        index: obs.date,
        cases: obs.cases,
        deaths: obs.deaths,
        recovered: obs.recovered,
    }
}

// ── EntityAggregator ──────────────────────────────────────────────────────────

/// Stateless helper that builds per-entity series from raw observations.
pub struct EntityAggregator;

impl EntityAggregator {
    /// Union of the three selection policies.
    ///
    /// The name sets are expected to be disjoint; this is not checked here
    /// (see [`EntitySelection::validate`]). A name present in two sets yields
    /// overlapping rows under the same entity.
    pub fn aggregate(rows: &[Observation], selection: &EntitySelection) -> AggregatedSeries {
        let mut series = AggregatedSeries::new();

        for part in [
            Self::select_mainland(rows, &selection.mainland),
            Self::sum_multistate(rows, &selection.multistate),
            Self::promote_states(rows, &selection.promoted_states),
        ] {
            for (entity, points) in part.iter() {
                series.extend_entity(entity, points.to_vec());
            }
        }

        series.sort_by_index();

        debug!(
            "Aggregated {} raw rows into {} entities ({} rows)",
            rows.len(),
            series.len(),
            series.row_count()
        );
        series
    }

    /// Country-level rows of each mainland country, values unchanged.
    pub fn select_mainland(rows: &[Observation], countries: &BTreeSet<String>) -> AggregatedSeries {
        let mut series = AggregatedSeries::new();
        for obs in rows
            .iter()
            .filter(|o| countries.contains(&o.country) && o.is_country_level())
        {
            series.extend_entity(obs.country.as_str(), vec![point_of(obs)]);
        }
        series.sort_by_index();
        series
    }

    /// All rows of each multi-state country, summed per date.
    pub fn sum_multistate(rows: &[Observation], countries: &BTreeSet<String>) -> AggregatedSeries {
        // BTreeMap keeps dates sorted per country.
        let mut totals: BTreeMap<&str, BTreeMap<NaiveDate, DailyCounts>> = BTreeMap::new();

        for obs in rows.iter().filter(|o| countries.contains(&o.country)) {
            totals
                .entry(obs.country.as_str())
                .or_default()
                .entry(obs.date)
                .or_default()
                .add_observation(obs);
        }

        let mut series = AggregatedSeries::new();
        for (country, by_date) in totals {
            let points = by_date
                .into_iter()
                .map(|(date, counts)| counts.into_point(date))
                .collect();
            series.insert(country, points);
        }
        series
    }

    /// Rows of each promoted state, keyed by the state name.
    pub fn promote_states(rows: &[Observation], states: &BTreeSet<String>) -> AggregatedSeries {
        let mut series = AggregatedSeries::new();
        for obs in rows.iter() {
            let Some(state) = obs.state.as_deref() else {
                continue;
            };
            if states.contains(state) {
                series.extend_entity(state, vec![point_of(obs)]);
            }
        }
        series.sort_by_index();
        series
    }
}

/// Build the canonical per-entity series from raw rows.
///
/// Convenience form of [`EntityAggregator::aggregate`] taking the three name
/// sets directly.
pub fn aggregate(
    rows: &[Observation],
    mainland: &BTreeSet<String>,
    multistate: &BTreeSet<String>,
    promoted_states: &BTreeSet<String>,
) -> AggregatedSeries {
    let selection = EntitySelection {
        mainland: mainland.clone(),
        multistate: multistate.clone(),
        promoted_states: promoted_states.clone(),
    };
    EntityAggregator::aggregate(rows, &selection)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn obs(country: &str, state: Option<&str>, d: u32, cases: u64, deaths: u64) -> Observation {
        Observation {
            country: country.to_string(),
            state: state.map(str::to_string),
            date: day(d),
            cases,
            deaths,
            recovered: None,
        }
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_rows() -> Vec<Observation> {
        vec![
            obs("France", None, 1, 100, 2),
            obs("France", Some("France"), 2, 130, 3),
            obs("France", Some("Reunion"), 2, 5, 0),
            obs("China", Some("Hubei"), 1, 400, 10),
            obs("China", Some("Beijing"), 1, 20, 1),
            obs("China", Some("Hubei"), 2, 500, 12),
            obs("China", Some("Beijing"), 2, 25, 1),
            obs("US", Some("New York"), 2, 30, 0),
            obs("US", Some("New York"), 1, 10, 0),
            obs("US", Some("Washington"), 1, 12, 1),
        ]
    }

    // ── mainland ──────────────────────────────────────────────────────────────

    #[test]
    fn test_mainland_excludes_other_states() {
        let series = EntityAggregator::select_mainland(&sample_rows(), &names(&["France"]));
        let france = series.get("France").unwrap();

        assert_eq!(france.len(), 2);
        assert_eq!((france[0].index, france[0].cases), (day(1), 100));
        assert_eq!((france[1].index, france[1].cases), (day(2), 130));
    }

    #[test]
    fn test_mainland_without_country_level_rows_is_absent() {
        let series = EntityAggregator::select_mainland(&sample_rows(), &names(&["China"]));
        assert!(series.is_empty());
    }

    // ── multistate ────────────────────────────────────────────────────────────

    #[test]
    fn test_multistate_sums_per_date() {
        let series = EntityAggregator::sum_multistate(&sample_rows(), &names(&["China"]));
        let china = series.get("China").unwrap();

        assert_eq!(china.len(), 2);
        assert_eq!((china[0].cases, china[0].deaths), (420, 11));
        assert_eq!((china[1].cases, china[1].deaths), (525, 13));
    }

    #[test]
    fn test_multistate_recovered_sum_when_reported() {
        let mut rows = vec![
            obs("Canada", Some("Ontario"), 1, 10, 0),
            obs("Canada", Some("Quebec"), 1, 5, 0),
        ];
        rows[0].recovered = Some(3);

        let series = EntityAggregator::sum_multistate(&rows, &names(&["Canada"]));
        assert_eq!(series.get("Canada").unwrap()[0].recovered, Some(3));

        let unreported = EntityAggregator::sum_multistate(&rows[1..], &names(&["Canada"]));
        assert_eq!(unreported.get("Canada").unwrap()[0].recovered, None);
    }

    // ── promoted ──────────────────────────────────────────────────────────────

    #[test]
    fn test_promoted_state_renamed_and_sorted() {
        let series = EntityAggregator::promote_states(&sample_rows(), &names(&["New York"]));

        assert!(!series.contains("US"));
        let ny = series.get("New York").unwrap();
        assert_eq!(ny.len(), 2);
        assert_eq!(ny[0].index, day(1));
        assert_eq!(ny[1].index, day(2));
    }

    #[test]
    fn test_promoted_state_ignores_country_named_rows() {
        // Rows without a state never match a promoted name.
        let series = EntityAggregator::promote_states(&sample_rows(), &names(&["France"]));
        let france = series.get("France").unwrap();
        assert_eq!(france.len(), 1);
        assert_eq!(france[0].cases, 130);
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_union_of_policies() {
        let series = aggregate(
            &sample_rows(),
            &names(&["France"]),
            &names(&["China"]),
            &names(&["New York", "Washington"]),
        );

        let entities: Vec<&str> = series.entity_names().collect();
        assert_eq!(entities, vec!["China", "France", "New York", "Washington"]);
        assert_eq!(series.row_count(), 2 + 2 + 2 + 1);
    }

    #[test]
    fn test_aggregate_contributing_rows_disjoint() {
        let rows = sample_rows();
        let series = aggregate(
            &rows,
            &names(&["France"]),
            &names(&["China"]),
            &names(&["New York"]),
        );

        // Every case counted once: the output total equals the total of the
        // raw rows each policy selects.
        let selected: u64 = rows
            .iter()
            .filter(|o| {
                (o.country == "France" && o.is_country_level())
                    || o.country == "China"
                    || o.has_state("New York")
            })
            .map(|o| o.cases)
            .sum();
        let output: u64 = series.rows().map(|r| *r.cases).sum();
        assert_eq!(selected, output);
    }

    #[test]
    fn test_aggregate_empty_selection() {
        let series = EntityAggregator::aggregate(&sample_rows(), &EntitySelection::default());
        assert!(series.is_empty());
    }

    #[test]
    fn test_aggregate_unknown_names_absent() {
        let series = aggregate(
            &sample_rows(),
            &names(&["Atlantis"]),
            &BTreeSet::new(),
            &BTreeSet::new(),
        );
        assert!(series.is_empty());
    }

    #[test]
    fn test_aggregate_does_not_mutate_input() {
        let rows = sample_rows();
        let before = rows.clone();
        let _ = aggregate(&rows, &names(&["France"]), &names(&["China"]), &BTreeSet::new());
        assert_eq!(rows, before);
    }
}
