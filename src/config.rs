use anyhow::{Context, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_POPULATION_FILE: &str = "data/country_populations.csv";
pub const DEFAULT_VACCINATIONS_FILE: &str = "data/vaccinations.csv";

/// Runtime configuration, read from the environment (a `.env` file is
/// loaded by the binary before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Number of series rows buffered per batch while streaming the
    /// vaccination file.
    pub chunk_size: usize,
    pub population_file: String,
    pub vaccinations_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set in environment or .env file")?;

        let chunk_size = match std::env::var("CHUNK_SIZE") {
            Ok(value) => value
                .parse::<usize>()
                .with_context(|| format!("CHUNK_SIZE must be a positive integer, got {value:?}"))?,
            Err(_) => DEFAULT_CHUNK_SIZE,
        };
        if chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE must be greater than zero");
        }

        let population_file = std::env::var("POPULATION_FILE")
            .unwrap_or_else(|_| DEFAULT_POPULATION_FILE.to_string());
        let vaccinations_file = std::env::var("VACCINATIONS_FILE")
            .unwrap_or_else(|_| DEFAULT_VACCINATIONS_FILE.to_string());

        Ok(Self {
            database_url,
            chunk_size,
            population_file,
            vaccinations_file,
        })
    }
}
