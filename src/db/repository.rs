use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, QueryBuilder};

/// Write-ready projection of a country, including the derived
/// percentage. Built by the loader just before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryInsert {
    pub name: String,
    pub iso_code: String,
    pub population: i64,
    pub total_vaccinated: i64,
    pub percentage_vaccinated: f32,
}

/// A row read back from the `countries` table.
#[derive(Debug, FromRow)]
pub struct CountryRow {
    pub id: i64,
    pub name: String,
    pub iso_code: String,
    pub population: i64,
    pub total_vaccinated: i64,
    pub percentage_vaccinated: f32,
    pub created_at: DateTime<Utc>,
}

/// Drop and recreate the destination table. The dataset is a full,
/// non-incremental replace on every run, so prior contents are discarded.
pub async fn reset_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS countries")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE countries ( \
           id BIGSERIAL PRIMARY KEY, \
           name TEXT NOT NULL, \
           iso_code TEXT NOT NULL, \
           population BIGINT NOT NULL, \
           total_vaccinated BIGINT NOT NULL DEFAULT 0, \
           percentage_vaccinated REAL NOT NULL DEFAULT 0, \
           created_at TIMESTAMPTZ NOT NULL DEFAULT now() \
         )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// Keeps each statement under the PostgreSQL bind-parameter limit
// (5 parameters per row).
const INSERT_BATCH_SIZE: usize = 1000;

/// Insert all countries inside a single transaction. Statements are
/// chunked to stay under the parameter limit, but the commit is
/// all-or-nothing: any failure rolls everything back.
pub async fn insert_countries(
    pool: &PgPool,
    countries: &[CountryInsert],
) -> Result<usize, sqlx::Error> {
    if countries.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut total_inserted = 0;

    for chunk in countries.chunks(INSERT_BATCH_SIZE) {
        let mut query_builder = QueryBuilder::new(
            "INSERT INTO countries \
             (name, iso_code, population, total_vaccinated, percentage_vaccinated) ",
        );

        query_builder.push_values(chunk, |mut row, country| {
            row.push_bind(&country.name)
                .push_bind(&country.iso_code)
                .push_bind(country.population)
                .push_bind(country.total_vaccinated)
                .push_bind(country.percentage_vaccinated);
        });

        let result = query_builder.build().execute(&mut *tx).await?;
        total_inserted += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(total_inserted)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<CountryRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, name, iso_code, population, total_vaccinated, \
         percentage_vaccinated, created_at \
         FROM countries \
         ORDER BY iso_code",
    )
    .fetch_all(pool)
    .await
}

pub async fn count_total(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM countries")
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}
