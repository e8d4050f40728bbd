//! Raw observation table loading and data-file discovery.
//!
//! Reads the daily per-region counts exported by the data provider into
//! [`Observation`] rows, and locates the raw and population files inside a
//! data directory.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use epicurve_core::dates::parse_date;
use epicurve_core::defaults::{COUNTRY_POPULATION_CSV, COUNTRY_POPULATION_CSV_RE, RAW_DATA_CSV};
use epicurve_core::models::Observation;
use epicurve_core::{EpicurveError, Result};
use regex::Regex;
use tracing::{debug, warn};

// ── Column aliases ────────────────────────────────────────────────────────────

const COUNTRY_COLUMNS: &[&str] = &["country", "country/region", "country_region"];
const STATE_COLUMNS: &[&str] = &["state", "province/state", "province_state"];
const DATE_COLUMNS: &[&str] = &["date", "observationdate"];
const CASES_COLUMNS: &[&str] = &["cases", "confirmed"];
const DEATHS_COLUMNS: &[&str] = &["deaths"];
const RECOVERED_COLUMNS: &[&str] = &["recovered"];

/// Positions of the known columns within a header row.
struct ColumnMap {
    country: usize,
    state: Option<usize>,
    date: usize,
    cases: usize,
    deaths: usize,
    recovered: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();

        let find = |aliases: &[&str]| aliases.iter().find_map(|a| index.get(*a).copied());
        let require = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| EpicurveError::MissingColumn(aliases[0].to_string()))
        };

        Ok(Self {
            country: require(COUNTRY_COLUMNS)?,
            state: find(STATE_COLUMNS),
            date: require(DATE_COLUMNS)?,
            cases: require(CASES_COLUMNS)?,
            deaths: require(DEATHS_COLUMNS)?,
            recovered: find(RECOVERED_COLUMNS),
        })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the raw observation table from a CSV file.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>> {
    let file = std::fs::File::open(path).map_err(|source| EpicurveError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let observations = read_observations(file)?;
    debug!(
        "Loaded {} observations from {}",
        observations.len(),
        path.display()
    );
    Ok(observations)
}

/// Parse the raw observation table from any CSV source.
///
/// Header names are matched case-insensitively and may use either the
/// canonical names (`country`, `state`, `date`, `cases`, `deaths`,
/// `recovered`) or the provider names (`Country/Region`, `Province/State`,
/// `Date`, `Confirmed`, `Deaths`, `Recovered`). `state` and `recovered` are
/// optional. An empty state cell is read as a country-level row.
pub fn read_observations<R: Read>(source: R) -> Result<Vec<Observation>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut observations = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        let record = result?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        observations.push(parse_record(&record, &columns, line)?);
    }

    Ok(observations)
}

/// Locate the raw observation file inside `data_dir`.
pub fn find_raw_data_file(data_dir: &Path) -> Result<PathBuf> {
    list_csv_files(data_dir)?
        .into_iter()
        .find(|p| file_name(p) == Some(RAW_DATA_CSV))
        .ok_or_else(|| EpicurveError::NoDataFiles {
            kind: "observation",
            dir: data_dir.to_path_buf(),
        })
}

/// Locate the population reference inside `data_dir`.
///
/// Prefers the World Bank download name, then the renamed snapshot.
pub fn find_population_file(data_dir: &Path) -> Result<PathBuf> {
    let pattern = Regex::new(COUNTRY_POPULATION_CSV_RE)
        .map_err(|e| EpicurveError::Config(format!("invalid population file pattern: {e}")))?;
    let files = list_csv_files(data_dir)?;

    files
        .iter()
        .find(|p| file_name(p).is_some_and(|name| pattern.is_match(name)))
        .or_else(|| {
            files
                .iter()
                .find(|p| file_name(p) == Some(COUNTRY_POPULATION_CSV))
        })
        .cloned()
        .ok_or_else(|| EpicurveError::NoDataFiles {
            kind: "population",
            dir: data_dir.to_path_buf(),
        })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// All `.csv` files under `data_dir`, sorted by path.
fn list_csv_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.exists() {
        warn!("Data path does not exist: {}", data_dir.display());
        return Err(EpicurveError::DataPathNotFound(data_dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn parse_record(record: &StringRecord, columns: &ColumnMap, line: usize) -> Result<Observation> {
    let field = |i: usize| record.get(i).unwrap_or("");

    let country = field(columns.country);
    if country.is_empty() {
        return Err(EpicurveError::EmptyField {
            column: "country".to_string(),
            line,
        });
    }

    let state = columns
        .state
        .map(field)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let date = parse_date(field(columns.date))?;
    let cases = parse_count(field(columns.cases), "cases", line)?;
    let deaths = parse_count(field(columns.deaths), "deaths", line)?;
    let recovered = match columns.recovered.map(field) {
        Some(raw) if !raw.is_empty() => Some(parse_count(raw, "recovered", line)?),
        _ => None,
    };

    Ok(Observation {
        country: country.to_string(),
        state,
        date,
        cases,
        deaths,
        recovered,
    })
}

/// Parse a non-negative whole count. Integral floats (`"12.0"`) are accepted
/// since some provider exports write counts that way.
fn parse_count(raw: &str, column: &str, line: usize) -> Result<u64> {
    let invalid = || EpicurveError::InvalidCount {
        column: column.to_string(),
        value: raw.to_string(),
        line,
    };

    if let Ok(n) = raw.parse::<u64>() {
        return Ok(n);
    }

    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(invalid()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
