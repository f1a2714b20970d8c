use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;

use super::population::CountryMap;
use crate::domain::is_aggregate_code;

/// Raw vaccination observation. The count column may be empty (no
/// figure reported for that day) and is often float-formatted.
#[derive(Debug, Deserialize)]
struct SeriesRow {
    iso_code: String,
    date: NaiveDate,
    people_fully_vaccinated: Option<f64>,
}

const REQUIRED_COLUMNS: [&str; 3] = ["iso_code", "date", "people_fully_vaccinated"];

/// Merge the vaccination time series into the country map and return it.
///
/// The series file may be large, so it is streamed in batches of at most
/// `chunk_size` rows. Within a batch the most recent observation per
/// country wins; across batches an observation is applied only when its
/// date is strictly newer than the best date already applied for that
/// country, so the globally freshest valid observation survives
/// regardless of how rows fall into batches.
pub fn reconcile(countries: CountryMap, path: &str, chunk_size: usize) -> Result<CountryMap> {
    let file =
        File::open(path).with_context(|| format!("Failed to open vaccinations file: {path}"))?;

    reconcile_from_reader(countries, file, chunk_size)
}

pub fn reconcile_from_reader<R: Read>(
    mut countries: CountryMap,
    input: R,
    chunk_size: usize,
) -> Result<CountryMap> {
    let mut reader = csv::Reader::from_reader(input);

    let headers = reader
        .headers()
        .context("Failed to read vaccinations file headers")?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("Vaccinations file is missing required column {column:?}");
        }
    }

    let mut batch: Vec<SeriesRow> = Vec::with_capacity(chunk_size.min(16_384));
    // Date of the last observation successfully applied per country.
    let mut best_dates: HashMap<String, NaiveDate> = HashMap::new();
    let mut batches = 0;

    for result in reader.deserialize::<SeriesRow>() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!("Skipping malformed vaccination row: {}", err);
                continue;
            }
        };

        if is_aggregate_code(&row.iso_code) {
            continue;
        }

        batch.push(row);
        if batch.len() >= chunk_size {
            apply_batch(&mut batch, &mut countries, &mut best_dates);
            batch.clear();
            batches += 1;
        }
    }

    if !batch.is_empty() {
        apply_batch(&mut batch, &mut countries, &mut best_dates);
        batches += 1;
    }

    tracing::info!(
        "Reconciled vaccination data for {} countries across {} batches",
        best_dates.len(),
        batches
    );

    Ok(countries)
}

/// Apply one batch of observations to the country map.
fn apply_batch(
    batch: &mut [SeriesRow],
    countries: &mut CountryMap,
    best_dates: &mut HashMap<String, NaiveDate>,
) {
    // Stable descending sort: on equal dates the earlier source row wins.
    batch.sort_by(|a, b| b.date.cmp(&a.date));

    // Most recent observation per country that actually carries a count.
    // Rows with an empty count are passed over so a slightly older figure
    // still beats no figure at all.
    let mut latest: HashMap<&str, (NaiveDate, i64)> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for row in batch.iter() {
        seen.insert(&row.iso_code);
        if latest.contains_key(row.iso_code.as_str()) {
            continue;
        }
        if let Some(count) = row.people_fully_vaccinated {
            if count.is_finite() {
                latest.insert(&row.iso_code, (row.date, count.round() as i64));
            }
        }
    }

    for code in seen {
        let Some(country) = countries.get_mut(code) else {
            tracing::warn!("Country {} is not present in the reference data", code);
            continue;
        };

        let Some(&(date, count)) = latest.get(code) else {
            tracing::warn!("Vaccinated count is missing for country {}", code);
            continue;
        };

        if let Some(best) = best_dates.get(code) {
            if date <= *best {
                continue;
            }
        }

        match country.set_total_vaccinated(count) {
            Ok(()) => {
                best_dates.insert(code.to_string(), date);
            }
            Err(err) => {
                tracing::warn!("Keeping previous vaccinated count: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Country;

    const HEADER: &str = "iso_code,date,people_fully_vaccinated\n";

    fn reference(entries: &[(&str, &str, i64)]) -> CountryMap {
        entries
            .iter()
            .map(|&(name, code, population)| {
                (
                    code.to_string(),
                    Country::new(name, code, population, 0).unwrap(),
                )
            })
            .collect()
    }

    fn run(countries: CountryMap, rows: &str, chunk_size: usize) -> CountryMap {
        reconcile_from_reader(countries, format!("{HEADER}{rows}").as_bytes(), chunk_size).unwrap()
    }

    #[test]
    fn test_most_recent_observation_wins_within_batch() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-01-01,100\nXL,2021-02-01,150\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 150);
    }

    #[test]
    fn test_equal_dates_first_source_row_wins() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-02-01,120\nXL,2021-02-01,130\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 120);
    }

    #[test]
    fn test_unknown_code_is_skipped() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "ZZ,2021-01-01,5\n", 100);

        assert_eq!(countries.len(), 1);
        assert_eq!(countries["XL"].total_vaccinated(), 0);
    }

    #[test]
    fn test_count_above_population_keeps_prior_value() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-01-01,5000\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 0);
    }

    #[test]
    fn test_rejected_observation_does_not_block_older_valid_one() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        // The freshest row violates the invariant in a later batch; the
        // older valid figure from the first batch must survive.
        let countries = run(countries, "XL,2021-01-01,100\nXL,2021-02-01,5000\n", 1);

        assert_eq!(countries["XL"].total_vaccinated(), 100);
    }

    #[test]
    fn test_empty_count_falls_back_to_older_row() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-01-01,100\nXL,2021-02-01,\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 100);
    }

    #[test]
    fn test_all_counts_missing_leaves_zero() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-01-01,\nXL,2021-02-01,\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 0);
    }

    #[test]
    fn test_aggregate_rows_are_dropped() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "OWID_WRL,2021-03-01,900\nXL,2021-01-01,100\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 100);
    }

    #[test]
    fn test_float_formatted_count_is_accepted() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-01-01,150.0\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 150);
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(countries, "XL,2021-01-01,-5\n", 100);

        assert_eq!(countries["XL"].total_vaccinated(), 0);
    }

    #[test]
    fn test_malformed_date_row_is_skipped() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = run(
            countries,
            "XL,not-a-date,999\nXL,2021-01-01,100\n",
            100,
        );

        assert_eq!(countries["XL"].total_vaccinated(), 100);
    }

    #[test]
    fn test_newest_date_wins_across_batches() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        // chunk_size 1 puts each row in its own batch; the second batch
        // carries an older date and must not overwrite.
        let countries = run(countries, "XL,2021-02-01,150\nXL,2021-01-01,100\n", 1);

        assert_eq!(countries["XL"].total_vaccinated(), 150);
    }

    #[test]
    fn test_single_batch_reconcile_is_idempotent() {
        let countries = reference(&[("Xland", "XL", 1000), ("Yland", "YL", 2000)]);
        let rows = "XL,2021-01-01,100\nXL,2021-02-01,150\nYL,2021-01-15,400\n";

        let once = run(countries, rows, 100);
        let twice = run(once.clone(), rows, 100);

        assert_eq!(once, twice);
        assert_eq!(twice["XL"].total_vaccinated(), 150);
        assert_eq!(twice["YL"].total_vaccinated(), 400);
    }

    #[test]
    fn test_empty_series_leaves_map_untouched() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let countries = reconcile_from_reader(countries, HEADER.as_bytes(), 100).unwrap();

        assert_eq!(countries["XL"].total_vaccinated(), 0);
    }

    #[test]
    fn test_missing_required_column_is_structural() {
        let countries = reference(&[("Xland", "XL", 1000)]);

        let result = reconcile_from_reader(
            countries,
            "iso_code,date\nXL,2021-01-01\n".as_bytes(),
            100,
        );

        assert!(result.is_err());
    }
}
