use std::path::{Path, PathBuf};
use std::sync::Mutex;

use epicurve_core::defaults::DATA_DIR;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a Python-style level name onto a tracing filter directive.
///
/// Unrecognised names are passed through lower-cased so that full
/// `EnvFilter` directives (e.g. `epicurve_data=debug`) keep working.
pub fn normalise_level(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr, or are appended to `log_file` when given; stdout is
/// reserved for the output table.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(normalise_level(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let (stderr_layer, file_layer) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            (Some(layer), None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

// ── Data-directory discovery ───────────────────────────────────────────────────

/// Locate the directory holding the raw and population files.
///
/// Returns `explicit` when given. Otherwise checks, in order:
/// 1. `./data/`
/// 2. `<platform data dir>/epicurve/`
///
/// Returns `None` when none of them exists.
pub fn discover_data_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    discover_data_dir_from(Path::new("."), dirs::data_dir().as_deref())
}

/// Same as [`discover_data_dir`] with explicit base directories.
fn discover_data_dir_from(cwd: &Path, platform_data: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = vec![cwd.join(DATA_DIR)];
    if let Some(base) = platform_data {
        candidates.push(base.join("epicurve"));
    }
    candidates.into_iter().find(|p| p.is_dir())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
