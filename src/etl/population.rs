use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use crate::domain::{is_aggregate_code, Country};

/// Countries keyed by ISO code. Exclusively owned by the pipeline;
/// each stage takes the map by value and returns it.
pub type CountryMap = HashMap<String, Country>;

/// Raw reference row as it appears in the source file. Extra columns
/// are ignored; the population column is named after the reference year.
#[derive(Debug, Deserialize)]
struct PopulationRow {
    #[serde(rename = "Country Name")]
    name: String,
    #[serde(rename = "Country Code")]
    iso_code: String,
    #[serde(rename = "2020")]
    population: Option<f64>,
}

const REQUIRED_COLUMNS: [&str; 3] = ["Country Name", "Country Code", "2020"];

/// Parse the population reference file into a map of countries keyed by
/// ISO code. Aggregate rows are dropped, rows failing validation are
/// warned and skipped, and duplicate codes resolve to the last row read.
pub fn parse_countries(path: &str) -> Result<CountryMap> {
    let file =
        File::open(path).with_context(|| format!("Failed to open population file: {path}"))?;

    parse_countries_from_reader(file)
}

pub fn parse_countries_from_reader<R: Read>(input: R) -> Result<CountryMap> {
    let mut reader = csv::Reader::from_reader(input);

    // Missing required columns are structural: abort before reading rows.
    let headers = reader
        .headers()
        .context("Failed to read population file headers")?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("Population file is missing required column {column:?}");
        }
    }

    let mut countries = CountryMap::new();
    let mut skipped = 0;

    for result in reader.deserialize::<PopulationRow>() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!("Skipping malformed population row: {}", err);
                skipped += 1;
                continue;
            }
        };

        if is_aggregate_code(&row.iso_code) {
            continue;
        }

        // Missing population (e.g. no census figure for the reference
        // year) is recorded as 0, not treated as an error.
        let population = match row.population {
            Some(value) if value.is_finite() => value.round() as i64,
            Some(_) | None => 0,
        };

        match Country::new(&row.name, &row.iso_code, population, 0) {
            Ok(country) => {
                // Last row wins on duplicate codes.
                countries.insert(country.iso_code().to_string(), country);
            }
            Err(err) => {
                tracing::warn!("Skipping invalid population row: {}", err);
                skipped += 1;
            }
        }
    }

    tracing::info!(
        "Parsed {} countries from reference file ({} rows skipped)",
        countries.len(),
        skipped
    );

    Ok(countries)
}
