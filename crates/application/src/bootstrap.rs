//! Building the service graph from configuration.

use crate::services::{ServiceConfig, Services};
use anyhow::Context;
use recipe_hub_common::{AppConfig, SystemClock};
use recipe_hub_infrastructure::{
    DatabaseConfig, DatabasePool, MemoryStore, Persistence, PgDocumentStore,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Open the configured store: PostgreSQL when `database.url` is set, the
/// in-memory store otherwise.
#[instrument(skip(config))]
pub async fn connect(config: &AppConfig) -> anyhow::Result<Persistence> {
    let clock = Arc::new(SystemClock);

    if !config.database.is_configured() {
        info!("no database url configured, using the in-memory store");
        return Ok(Persistence::new(
            Arc::new(MemoryStore::new()),
            clock,
            config.pagination,
        ));
    }

    let db_config = DatabaseConfig::from_settings(&config.database)?;
    let pool = DatabasePool::new(&db_config)
        .await
        .context("failed to open the database pool")?;
    let store = PgDocumentStore::new(pool.pool().clone());

    if config.database.run_migrations {
        store.migrate().await.context("failed to run migrations")?;
    }

    info!(max_connections = db_config.max_connections, "postgres store ready");
    Ok(Persistence::new(Arc::new(store), clock, config.pagination))
}

/// Validate `config` and build every service over one store.
pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Services> {
    config.validate()?;
    let persistence = connect(config).await?;
    Ok(Services::new(persistence, ServiceConfig::from(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_bootstrap_without_database_uses_memory() {
        let config = AppConfig::default();
        assert!(!config.database.is_configured());

        let services = bootstrap(&config).await.unwrap();
        let count = services
            .categories
            .count(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
