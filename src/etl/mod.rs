pub mod loader;
pub mod population;
pub mod vaccinations;

use anyhow::Result;
use sqlx::PgPool;

use crate::config::Config;
use crate::db;

/// Run the full pipeline once: reset the destination table, parse the
/// population reference file, merge in the latest vaccination
/// observations, and bulk-load the result.
pub async fn run(pool: &PgPool, config: &Config) -> Result<()> {
    // Full reload: the source data is replaced wholesale on every run,
    // so the table is dropped and recreated up front.
    tracing::info!("Resetting destination table");
    db::repository::reset_schema(pool).await?;

    tracing::info!("Parsing population reference file: {}", config.population_file);
    let countries = population::parse_countries(&config.population_file)?;

    tracing::info!(
        "Reconciling vaccination series: {} (chunk size {})",
        config.vaccinations_file,
        config.chunk_size
    );
    let countries =
        vaccinations::reconcile(countries, &config.vaccinations_file, config.chunk_size)?;

    let inserted = loader::load(pool, countries.into_values().collect()).await?;
    tracing::info!("Load complete: {} countries persisted", inserted);

    Ok(())
}
