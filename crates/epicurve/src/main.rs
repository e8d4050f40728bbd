mod bootstrap;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use epicurve_core::settings::Settings;
use epicurve_data::analysis::{run_pipeline, PipelineOptions, ProcessedTable};
use epicurve_data::population::load_population_file;
use epicurve_data::reader::{find_population_file, find_raw_data_file, load_observations};

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("epicurve v{} starting", env!("CARGO_PKG_VERSION"));

    let selection = settings.selection();
    if selection.is_empty() {
        bail!("No entities selected; pass --country, --multistate or --state");
    }

    let data_dir = bootstrap::discover_data_dir(settings.data_dir.as_deref());

    // ── Inputs ────────────────────────────────────────────────────────────────
    let data_path = match &settings.data {
        Some(path) => path.clone(),
        None => find_raw_data_file(&require_dir(&data_dir, "--data")?)?,
    };
    tracing::info!("Reading observations from {}", data_path.display());
    let observations = load_observations(&data_path)?;

    let population = if settings.per_capita {
        let path = match &settings.population {
            Some(path) => path.clone(),
            None => find_population_file(&require_dir(&data_dir, "--population")?)?,
        };
        tracing::info!(
            "Reading {} population from {}",
            settings.population_year,
            path.display()
        );
        Some(load_population_file(&path, &settings.population_year)?)
    } else {
        None
    };

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let options = PipelineOptions {
        selection,
        metric: settings.metric()?,
        threshold: settings.threshold,
        align: !settings.no_align,
        population_size: settings.population_size,
    };
    let result = run_pipeline(&observations, population.as_ref(), &options)?;

    for (entity, date) in &result.report.trigger_dates {
        tracing::debug!("{} day 0: {}", entity, date);
    }
    if !result.report.excluded_entities.is_empty() {
        tracing::warn!(
            "Excluded (never reached {} {}): {}",
            options.threshold,
            options.metric,
            result.report.excluded_entities.join(", ")
        );
    }

    // ── Output ────────────────────────────────────────────────────────────────
    match &settings.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_table(&result.table, &settings.format, std::io::BufWriter::new(file))?;
            tracing::info!("Wrote {} rows to {}", result.report.rows_output, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_table(&result.table, &settings.format, stdout.lock())?;
        }
    }

    Ok(())
}

fn require_dir(data_dir: &Option<PathBuf>, flag: &str) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir.clone()),
        None => bail!("No data directory found; pass {flag} or --data-dir"),
    }
}

fn write_table<W: Write>(table: &ProcessedTable, format: &str, mut writer: W) -> Result<()> {
    match format {
        "json" => {
            table.write_json(&mut writer)?;
            writeln!(writer)?;
        }
        _ => table.write_csv(&mut writer)?,
    }
    writer.flush()?;
    Ok(())
}
