//! Default values and fixed naming conventions shared by every stage.

/// Threshold applied to the trigger metric when none is given.
pub const DEFAULT_THRESHOLD: u64 = 100;

/// Population every per-capita value is rescaled to.
pub const DEFAULT_POPULATION_SIZE: u64 = 10_000_000;

/// Year column selected from the population reference.
pub const POPULATION_YEAR_COLUMN: &str = "2018";

/// Column holding the country name in the population reference.
pub const POPULATION_NAME_COLUMN: &str = "Country Name";

/// Reference names re-keyed to the entity names used by the case data.
pub const POPULATION_ALIASES: &[(&str, &str)] = &[("United States", "US")];

/// File name pattern of the World Bank population download.
pub const COUNTRY_POPULATION_CSV_RE: &str = r"^API_SP\.POP\.TOTL_DS2_en_csv_.*\.csv$";

/// Fallback file name for a renamed population snapshot.
pub const COUNTRY_POPULATION_CSV: &str = "world_population.csv";

/// File name of the raw observation table inside the data directory.
pub const RAW_DATA_CSV: &str = "covid_19_clean_complete.csv";

/// Directory searched for data files when none is given.
pub const DATA_DIR: &str = "data";

/// Apply [`POPULATION_ALIASES`] to a reference name.
pub fn alias_population_name(name: &str) -> &str {
    POPULATION_ALIASES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_united_states() {
        assert_eq!(alias_population_name("United States"), "US");
    }

    #[test]
    fn test_alias_passthrough() {
        assert_eq!(alias_population_name("France"), "France");
        assert_eq!(alias_population_name("US"), "US");
    }
}
