use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the epicurve crates.
#[derive(Error, Debug)]
pub enum EpicurveError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document could not be parsed or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed or written.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A date string did not match any recognised format.
    #[error("Invalid date format: {0}")]
    DateParse(String),

    /// A count cell is not a non-negative whole number.
    #[error("Invalid {column} value {value:?} on line {line}")]
    InvalidCount {
        column: String,
        value: String,
        line: usize,
    },

    /// A required cell is empty.
    #[error("Empty {column} value on line {line}")]
    EmptyField { column: String, line: usize },

    /// A column the transforms depend on is absent.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The same name was placed in more than one entity category.
    #[error("Entity {0:?} appears in more than one selection category")]
    OverlappingEntity(String),

    /// An entity has no entry in the population reference.
    #[error("No population found for entity {0:?}")]
    PopulationNotFound(String),

    /// A population entry cannot be used as a divisor.
    #[error("Invalid population {population} for entity {entity:?}")]
    InvalidPopulation { entity: String, population: u64 },

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No matching data file was found under the given directory.
    #[error("No {kind} file found in {dir}")]
    NoDataFiles { kind: &'static str, dir: PathBuf },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the epicurve crates.
pub type Result<T> = std::result::Result<T, EpicurveError>;
