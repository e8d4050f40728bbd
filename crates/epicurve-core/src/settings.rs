use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::defaults::{DEFAULT_POPULATION_SIZE, DEFAULT_THRESHOLD, POPULATION_YEAR_COLUMN};
use crate::error::{EpicurveError, Result};
use crate::models::{EntitySelection, Metric};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Align and normalize daily epidemic curves across countries
#[derive(Parser, Debug, Clone)]
#[command(
    name = "epicurve",
    about = "Align and normalize daily epidemic curves across countries",
    version
)]
pub struct Settings {
    /// Raw observation CSV (defaults to the file found in --data-dir)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Directory searched for the raw and population files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Population reference CSV (defaults to the file found in --data-dir)
    #[arg(long)]
    pub population: Option<PathBuf>,

    /// Country kept as-is, country-level rows only (repeatable)
    #[arg(long = "country", value_name = "NAME")]
    pub countries: Vec<String>,

    /// Country whose states are summed per date (repeatable)
    #[arg(long = "multistate", value_name = "NAME")]
    pub multistate: Vec<String>,

    /// State promoted to an entity of its own (repeatable)
    #[arg(long = "state", value_name = "NAME")]
    pub states: Vec<String>,

    /// Metric the trigger threshold applies to
    #[arg(long, default_value = "cases", value_parser = ["cases", "deaths", "recovered"])]
    pub metric: String,

    /// Trigger threshold; day 0 is the first day the metric reaches it
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u64,

    /// Keep the calendar date axis instead of days since trigger
    #[arg(long)]
    pub no_align: bool,

    /// Rescale cases and deaths per --population-size inhabitants
    #[arg(long)]
    pub per_capita: bool,

    /// Population size per-capita values are expressed against
    #[arg(long, default_value_t = DEFAULT_POPULATION_SIZE)]
    pub population_size: u64,

    /// Year column read from the population reference
    #[arg(long, default_value = POPULATION_YEAR_COLUMN)]
    pub population_year: String,

    /// Output format
    #[arg(long, default_value = "csv", value_parser = ["csv", "json"])]
    pub format: String,

    /// Output file (stdout when omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// JSON run configuration; command-line values take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── RunConfig ──────────────────────────────────────────────────────────────────

/// Run parameters stored in a JSON file and passed with `--config`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multistate: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_capita: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl RunConfig {
    /// Load a run configuration. A missing or malformed file is an error:
    /// the caller asked for it explicitly.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EpicurveError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and merge the `--config` file, if any.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Result<Self> {
        // Raw ArgMatches are needed to query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if let Some(path) = settings.config.clone() {
            let config = RunConfig::load_from(&path)?;
            settings.merge_config(config, &matches);
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Fill every field not given on the command line from `config`.
    fn merge_config(&mut self, config: RunConfig, matches: &clap::ArgMatches) {
        // NOTE: clap stores the arg id using the field name, not the flag.
        let explicit = |name: &str| is_arg_explicitly_set(matches, name);

        if !explicit("data") && config.data.is_some() {
            self.data = config.data;
        }
        if !explicit("data_dir") && config.data_dir.is_some() {
            self.data_dir = config.data_dir;
        }
        if !explicit("population") && config.population.is_some() {
            self.population = config.population;
        }
        if !explicit("countries") {
            if let Some(v) = config.countries {
                self.countries = v;
            }
        }
        if !explicit("multistate") {
            if let Some(v) = config.multistate {
                self.multistate = v;
            }
        }
        if !explicit("states") {
            if let Some(v) = config.states {
                self.states = v;
            }
        }
        if !explicit("metric") {
            if let Some(v) = config.metric {
                self.metric = v;
            }
        }
        if !explicit("threshold") {
            if let Some(v) = config.threshold {
                self.threshold = v;
            }
        }
        if !explicit("no_align") {
            if let Some(align) = config.align {
                self.no_align = !align;
            }
        }
        if !explicit("per_capita") {
            if let Some(v) = config.per_capita {
                self.per_capita = v;
            }
        }
        if !explicit("population_size") {
            if let Some(v) = config.population_size {
                self.population_size = v;
            }
        }
        if !explicit("population_year") {
            if let Some(v) = config.population_year {
                self.population_year = v;
            }
        }
        if !explicit("format") {
            if let Some(v) = config.format {
                self.format = v;
            }
        }
        if !explicit("output") && config.output.is_some() {
            self.output = config.output;
        }
        if !explicit("log_level") {
            if let Some(v) = config.log_level {
                self.log_level = v;
            }
        }
    }

    /// Reject values that only a config file could have smuggled past clap.
    fn validate(&self) -> Result<()> {
        self.metric()?;
        if self.population_size == 0 {
            return Err(EpicurveError::Config(
                "population size must be positive".to_string(),
            ));
        }
        if !matches!(self.format.as_str(), "csv" | "json") {
            return Err(EpicurveError::Config(format!(
                "unknown output format: {}",
                self.format
            )));
        }
        Ok(())
    }

    /// The trigger metric.
    pub fn metric(&self) -> Result<Metric> {
        self.metric.parse()
    }

    /// The three entity lists as a selection.
    pub fn selection(&self) -> EntitySelection {
        EntitySelection::new(
            self.countries.iter().cloned(),
            self.multistate.iter().cloned(),
            self.states.iter().cloned(),
        )
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("epicurve")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn write_config(tmp: &TempDir, config: &RunConfig) -> PathBuf {
        let path = tmp.path().join("run.json");
        config.save_to(&path).expect("save");
        path
    }

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["epicurve"]);

        assert!(settings.data.is_none());
        assert!(settings.countries.is_empty());
        assert_eq!(settings.metric, "cases");
        assert_eq!(settings.threshold, 100);
        assert!(!settings.no_align);
        assert!(!settings.per_capita);
        assert_eq!(settings.population_size, 10_000_000);
        assert_eq!(settings.population_year, "2018");
        assert_eq!(settings.format, "csv");
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
    }

    #[test]
    fn test_repeatable_entity_flags() {
        let settings = Settings::parse_from(args(&[
            "--country",
            "Italy",
            "--country",
            "Spain",
            "--multistate",
            "China",
            "--state",
            "New York",
        ]));
        let sel = settings.selection();
        assert_eq!(sel.mainland.len(), 2);
        assert!(sel.multistate.contains("China"));
        assert!(sel.promoted_states.contains("New York"));
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let settings = Settings::load_from_args(args(&["--debug"])).unwrap();
        assert_eq!(settings.log_level, "DEBUG");
    }

    // ── RunConfig ─────────────────────────────────────────────────────────────

    #[test]
    fn test_run_config_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let config = RunConfig {
            countries: Some(vec!["Italy".to_string()]),
            threshold: Some(50),
            align: Some(false),
            ..Default::default()
        };
        let path = write_config(&tmp, &config);
        assert_eq!(RunConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_run_config_missing_file_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = RunConfig::load_from(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, EpicurveError::FileRead { .. }));
    }

    #[test]
    fn test_run_config_rejects_unknown_fields() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, r#"{"treshold": 10}"#).unwrap();
        assert!(matches!(
            RunConfig::load_from(&path),
            Err(EpicurveError::JsonParse(_))
        ));
    }

    // ── merging ───────────────────────────────────────────────────────────────

    #[test]
    fn test_config_fills_unset_fields() {
        let tmp = TempDir::new().expect("tempdir");
        let path = write_config(
            &tmp,
            &RunConfig {
                countries: Some(vec!["Italy".to_string()]),
                metric: Some("deaths".to_string()),
                threshold: Some(10),
                align: Some(false),
                per_capita: Some(true),
                ..Default::default()
            },
        );

        let settings =
            Settings::load_from_args(args(&["--config", path.to_str().unwrap()])).unwrap();

        assert_eq!(settings.countries, vec!["Italy".to_string()]);
        assert_eq!(settings.metric().unwrap(), Metric::Deaths);
        assert_eq!(settings.threshold, 10);
        assert!(settings.no_align);
        assert!(settings.per_capita);
    }

    #[test]
    fn test_cli_wins_over_config() {
        let tmp = TempDir::new().expect("tempdir");
        let path = write_config(
            &tmp,
            &RunConfig {
                countries: Some(vec!["Italy".to_string()]),
                threshold: Some(10),
                ..Default::default()
            },
        );

        let settings = Settings::load_from_args(args(&[
            "--config",
            path.to_str().unwrap(),
            "--country",
            "Spain",
            "--threshold",
            "500",
        ]))
        .unwrap();

        assert_eq!(settings.countries, vec!["Spain".to_string()]);
        assert_eq!(settings.threshold, 500);
    }

    #[test]
    fn test_config_with_bad_metric_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let path = write_config(
            &tmp,
            &RunConfig {
                metric: Some("active".to_string()),
                ..Default::default()
            },
        );
        let err =
            Settings::load_from_args(args(&["--config", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, EpicurveError::Config(_)));
    }

    #[test]
    fn test_config_with_zero_population_size_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let path = write_config(
            &tmp,
            &RunConfig {
                population_size: Some(0),
                ..Default::default()
            },
        );
        assert!(Settings::load_from_args(args(&["--config", path.to_str().unwrap()])).is_err());
    }
}
