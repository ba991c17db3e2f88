//! Database setup and initialization
//!
//! The canonical store and the metadata store get their own pool and their own
//! migration set. They may point at the same database.

use std::path::Path;

use anyhow::{Context, Result};
use assetline_core::Config;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub struct Pools {
    pub canonical: PgPool,
    pub metadata: PgPool,
}

async fn connect(config: &Config, url: &str, store: &str) -> Result<PgPool> {
    tracing::info!(store, "Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(config.db_timeout())
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await
        .with_context(|| format!("Failed to connect to the {} database", store))?;

    tracing::info!(
        store,
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );
    Ok(pool)
}

async fn migrate(pool: &PgPool, set: &str) -> Result<()> {
    // Path: workspace migrations/ from crate root
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../migrations")
        .join(set);
    let mut migrator = Migrator::new(dir)
        .await
        .with_context(|| format!("Failed to load {} migrations", set))?;
    // Both sets share one history table when the stores share a database.
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .with_context(|| format!("Failed to run {} migrations", set))?;
    tracing::info!(set, "Database migrations applied");
    Ok(())
}

/// Connect both pools and run pending migrations on startup.
pub async fn setup_databases(config: &Config) -> Result<Pools> {
    let canonical = connect(config, &config.database_url, "canonical").await?;
    migrate(&canonical, "canonical").await?;

    let metadata = connect(config, &config.metadata_database_url, "metadata").await?;
    migrate(&metadata, "metadata").await?;

    Ok(Pools {
        canonical,
        metadata,
    })
}
