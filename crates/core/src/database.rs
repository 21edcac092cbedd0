//! # Database Pool
//!
//! Every table in this schema carries a `shop` column and every query in
//! `crates/engine` filters on it explicitly — there is no per-tenant schema
//! or connection pool here, just one shared-schema Postgres pool (see
//! SPEC_FULL.md §2.4 for why this departs from a schema-per-tenant design).

use crate::{config::DatabaseConfig, error::Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

#[derive(Clone)]
pub struct DatabasePool {
    pub pool: PgPool,
}

impl DatabasePool {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!("Initializing database pool");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        info!("Database pool initialized successfully");

        Ok(Self { pool })
    }

    pub async fn check_health(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Applies any pending migrations from the workspace-root `migrations/`
    /// directory. Called once at startup (see `crates/api/src/main.rs`).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await.map_err(|e| {
            crate::error::Error::internal(format!("failed to run database migrations: {e}"))
        })?;
        Ok(())
    }
}
