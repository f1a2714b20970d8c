use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::db::repository::{self, CountryInsert};
use crate::domain::Country;

/// Build the write-ready projection for every country, deriving the
/// vaccinated percentage at this point rather than storing it on the
/// entity.
pub fn project(countries: &[Country]) -> Vec<CountryInsert> {
    countries
        .iter()
        .map(|country| CountryInsert {
            name: country.name().to_string(),
            iso_code: country.iso_code().to_string(),
            population: country.population(),
            total_vaccinated: country.total_vaccinated(),
            percentage_vaccinated: country.vaccinated_percent() as f32,
        })
        .collect()
}

/// Project and persist all countries as one atomic bulk insert.
pub async fn load(pool: &PgPool, countries: Vec<Country>) -> Result<usize> {
    let rows = project(&countries);

    tracing::info!("Inserting {} countries into database", rows.len());
    let inserted = repository::insert_countries(pool, &rows)
        .await
        .context("Bulk insert of countries failed")?;

    Ok(inserted)
}
