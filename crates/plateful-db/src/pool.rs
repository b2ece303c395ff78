//! Connection pool, embedded schema migrations and database bootstrap.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations under `crates/plateful-db/migrations/`, embedded at build time.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables created by [`MIGRATOR`], in the order `db-init` reports them.
pub const KNOWN_TABLES: [&str; 3] = ["meal_preferences", "sessions", "users"];

pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!("migrations applied");
    Ok(())
}

/// `CREATE DATABASE` cannot take a bind parameter, so the name is spliced
/// into the statement and must be a plain identifier.
fn validate_database_name(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        bail!("database name {name:?} must be a lowercase identifier");
    }
    Ok(())
}

/// Create the database named in `config` if the server does not have it yet.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let name = config
        .database_name()
        .context("database URL does not name a database")?;
    validate_database_name(name)?;

    let maintenance_url = config.maintenance_url();
    let maint = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to {maintenance_url}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&maint)
            .await
            .context("failed to query pg_database")?;

    if exists {
        info!(db = name, "database already exists");
    } else {
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .with_context(|| format!("failed to create database {name}"))?;
        info!(db = name, "database created");
    }

    maint.close().await;
    Ok(())
}

/// Row count of each of [`KNOWN_TABLES`].
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(KNOWN_TABLES.len());
    for table in KNOWN_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table, count));
    }
    Ok(counts)
}
