//! Population reference loading and per-capita normalization.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use epicurve_core::defaults::{alias_population_name, DEFAULT_POPULATION_SIZE, POPULATION_NAME_COLUMN};
use epicurve_core::models::{NormalizedSeries, Point, Series};
use epicurve_core::{EpicurveError, Result};
use tracing::debug;

// ── PopulationReference ───────────────────────────────────────────────────────

/// Population per country name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationReference {
    populations: BTreeMap<String, u64>,
}

impl PopulationReference {
    /// Build a reference from raw `(name, value)` cells.
    ///
    /// Only values written as a plain base-10 integer are kept; footnote
    /// markers, empty cells, decimals and signs are dropped, not coerced.
    /// Names go through the fixed alias table ("United States" becomes "US").
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut populations = BTreeMap::new();
        let mut dropped = 0usize;

        for (name, value) in pairs {
            let name = name.as_ref();
            match parse_population(value.as_ref()) {
                Some(population) if !name.is_empty() => {
                    populations.insert(alias_population_name(name).to_string(), population);
                }
                _ => dropped += 1,
            }
        }

        debug!(
            "Population reference: {} entries kept, {} dropped",
            populations.len(),
            dropped
        );
        Self { populations }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.populations.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.populations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.populations.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Population of `entity`, usable as a divisor.
    pub fn lookup(&self, entity: &str) -> Result<u64> {
        match self.get(entity) {
            None => Err(EpicurveError::PopulationNotFound(entity.to_string())),
            Some(0) => Err(EpicurveError::InvalidPopulation {
                entity: entity.to_string(),
                population: 0,
            }),
            Some(population) => Ok(population),
        }
    }
}

fn parse_population(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load a population reference from a CSV file.
pub fn load_population_file(path: &Path, year_column: &str) -> Result<PopulationReference> {
    let file = std::fs::File::open(path).map_err(|source| EpicurveError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    load_population_reference(file, year_column)
}

/// Parse a population reference from CSV.
///
/// The header is the first row containing a "Country Name" cell; rows above
/// it (the World Bank export starts with a few metadata lines) are skipped.
/// Values come from the `year_column` column.
pub fn load_population_reference<R: Read>(source: R, year_column: &str) -> Result<PopulationReference> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut columns: Option<(usize, usize)> = None;
    let mut pairs: Vec<(String, String)> = Vec::new();

    for result in reader.records() {
        let record = result?;

        let Some((name_idx, year_idx)) = columns else {
            let Some(name_idx) = record.iter().position(|f| f == POPULATION_NAME_COLUMN) else {
                continue;
            };
            let year_idx = record
                .iter()
                .position(|f| f == year_column)
                .ok_or_else(|| EpicurveError::MissingColumn(year_column.to_string()))?;
            columns = Some((name_idx, year_idx));
            continue;
        };

        let name = record.get(name_idx).unwrap_or("");
        let value = record.get(year_idx).unwrap_or("");
        pairs.push((name.to_string(), value.to_string()));
    }

    if columns.is_none() {
        return Err(EpicurveError::MissingColumn(POPULATION_NAME_COLUMN.to_string()));
    }

    Ok(PopulationReference::from_pairs(pairs))
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Rescales count series to a fixed population size.
#[derive(Debug, Clone)]
pub struct PopulationNormalizer<'a> {
    reference: &'a PopulationReference,
    population_size: u64,
}

impl<'a> PopulationNormalizer<'a> {
    pub fn new(reference: &'a PopulationReference, population_size: u64) -> Self {
        Self {
            reference,
            population_size,
        }
    }

    pub fn with_default_size(reference: &'a PopulationReference) -> Self {
        Self::new(reference, DEFAULT_POPULATION_SIZE)
    }

    /// Rescale `cases` and `deaths` to `value / population * population_size`.
    ///
    /// Every entity must be in the reference; the first missing one aborts
    /// the whole call with [`EpicurveError::PopulationNotFound`]. Recovered
    /// counts and the index axis are left untouched. No rounding is applied.
    pub fn normalize<X: Clone>(&self, series: &Series<X, u64>) -> Result<NormalizedSeries<X>> {
        let size = self.population_size as f64;
        let mut normalized = NormalizedSeries::new();

        for (entity, points) in series.iter() {
            let population = self.reference.lookup(entity)? as f64;
            let scaled = points
                .iter()
                .map(|p| Point {
                    index: p.index.clone(),
                    cases: p.cases as f64 / population * size,
                    deaths: p.deaths as f64 / population * size,
                    recovered: p.recovered,
                })
                .collect();
            normalized.insert(entity, scaled);
        }

        debug!(
            "Normalized {} entities per {} inhabitants",
            normalized.len(),
            self.population_size
        );
        Ok(normalized)
    }
}

/// Per-capita form of `series`; see [`PopulationNormalizer::normalize`].
pub fn normalize<X: Clone>(
    series: &Series<X, u64>,
    population: &PopulationReference,
    population_size: u64,
) -> Result<NormalizedSeries<X>> {
    PopulationNormalizer::new(population, population_size).normalize(series)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
