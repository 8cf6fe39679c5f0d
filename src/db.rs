use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::AppConfig;

/// PostgreSQL-backed persistence gateway. The per-entity query impls live next to
/// each entity in its `repo.rs`.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig, database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        info!(max_connections = config.db_max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        if let Err(e) = sqlx::migrate!("./migrations").run(&self.pool).await {
            warn!(error = %e, "migration failed");
            return Err(e).context("run migrations");
        }
        Ok(())
    }
}
