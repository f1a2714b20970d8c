use anyhow::Result;

use vax_coverage_etl::config::Config;
use vax_coverage_etl::{db, etl};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    tracing::info!("Starting vaccination coverage import");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    etl::run(&pool, &config).await?;

    tracing::info!("Import process completed");

    Ok(())
}
