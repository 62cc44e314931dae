use anyhow::{Context, Result};
use asset_seeder::config::{Config, LogFormat};
use asset_seeder::{
    DataDir, Database, FixtureReader, HttpContentFetcher, S3ObjectStore, Seeder, SeederOptions,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, config.service.log_format);

    info!(
        service = %config.service.name,
        fixtures = %config.fixtures.base_dir.display(),
        "Starting asset seeder"
    );

    let data = FixtureReader::new(&config.fixtures.base_dir)
        .resolve()
        .context("Failed to locate fixture directory")?;

    let database = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let result = seed(&config, &database, data).await;

    database.close().await;

    match result {
        Ok(()) => {
            info!("Seeding completed");
            Ok(())
        }
        Err(e) => {
            error!("Seeding failed: {:#}", e);
            Err(e)
        }
    }
}

async fn seed(config: &Config, database: &Database, data: DataDir) -> Result<()> {
    if config.database.run_migrations {
        database
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    let store = S3ObjectStore::new(&config.s3).await;
    let content =
        HttpContentFetcher::new(&config.content).context("Failed to build content client")?;

    info!(content_host = %config.content.base_url(), "Content host selected");

    let seeder = Seeder::new(
        &store,
        &content,
        database,
        data,
        SeederOptions::from_config(config),
    );
    seeder.run().await.context("Seeding run aborted")?;

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}
