//! Writers for processed tables.
//!
//! Rows are grouped by entity in name order. The first column is the index
//! (`date` or `days`), followed by `country`, `cases`, `deaths` and
//! `recovered`.

use std::io::Write;

use epicurve_core::models::Series;
use epicurve_core::Result;
use serde::Serialize;

const VALUE_COLUMNS: [&str; 4] = ["country", "cases", "deaths", "recovered"];

/// Write `series` as CSV with `index_label` as the first column name.
pub fn write_csv<W, X, V>(writer: W, index_label: &str, series: &Series<X, V>) -> Result<()>
where
    W: Write,
    X: Serialize,
    V: Serialize,
{
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    let mut header = vec![index_label];
    header.extend(VALUE_COLUMNS);
    out.write_record(&header)?;

    for row in series.rows() {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

/// Rows of `series` as a JSON array of objects.
pub fn to_json<X, V>(index_label: &str, series: &Series<X, V>) -> Result<serde_json::Value>
where
    X: Serialize,
    V: Serialize,
{
    let mut rows = Vec::with_capacity(series.row_count());
    for row in series.rows() {
        let mut object = serde_json::Map::new();
        object.insert(index_label.to_string(), serde_json::to_value(row.index)?);
        object.insert("country".to_string(), row.country.into());
        object.insert("cases".to_string(), serde_json::to_value(row.cases)?);
        object.insert("deaths".to_string(), serde_json::to_value(row.deaths)?);
        object.insert("recovered".to_string(), serde_json::to_value(row.recovered)?);
        rows.push(serde_json::Value::Object(object));
    }
    Ok(serde_json::Value::Array(rows))
}

/// Write `series` as pretty-printed JSON.
pub fn write_json<W, X, V>(writer: W, index_label: &str, series: &Series<X, V>) -> Result<()>
where
    W: Write,
    X: Serialize,
    V: Serialize,
{
    let value = to_json(index_label, series)?;
    serde_json::to_writer_pretty(writer, &value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use epicurve_core::models::{AggregatedSeries, NormalizedSeries, Point};

    fn calendar() -> AggregatedSeries {
        let mut series = AggregatedSeries::new();
        series.insert(
            "Spain",
            vec![Point {
                index: NaiveDate::from_ymd_opt(2020, 3, 2).unwrap(),
                cases: 120,
                deaths: 1,
                recovered: None,
            }],
        );
        series.insert(
            "Italy",
            vec![Point {
                index: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                cases: 1694,
                deaths: 34,
                recovered: Some(83),
            }],
        );
        series
    }

    #[test]
    fn test_write_csv_calendar() {
        let mut buf = Vec::new();
        write_csv(&mut buf, "date", &calendar()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,country,cases,deaths,recovered");
        assert_eq!(lines[1], "2020-03-01,Italy,1694,34,83");
        assert_eq!(lines[2], "2020-03-02,Spain,120,1,");
    }

    #[test]
    fn test_write_csv_per_capita_days() {
        let mut series: NormalizedSeries<i64> = NormalizedSeries::new();
        series.insert(
            "A",
            vec![Point {
                index: 0,
                cases: 2.5,
                deaths: 0.25,
                recovered: None,
            }],
        );

        let mut buf = Vec::new();
        write_csv(&mut buf, "days", &series).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "days,country,cases,deaths,recovered\n0,A,2.5,0.25,\n");
    }

    #[test]
    fn test_to_json_rows() {
        let value = to_json("date", &calendar()).unwrap();
        let rows = value.as_array().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["date"], "2020-03-01");
        assert_eq!(rows[0]["country"], "Italy");
        assert_eq!(rows[0]["cases"], 1694);
        assert_eq!(rows[1]["recovered"], serde_json::Value::Null);
    }

    #[test]
    fn test_write_json_parses_back() {
        let mut buf = Vec::new();
        write_json(&mut buf, "date", &calendar()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }
}
