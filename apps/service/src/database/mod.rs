/// Database layer
///
/// The `MonitorStore` trait is the contract the engine and the HTTP layer
/// program against; `DatabaseImpl` backs it with LibSQL (SQLite).
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{DatabaseImpl, MonitorStore};

use anyhow::{Result, anyhow};

use crate::config::DatabaseConfig;
use crate::pool::open_local;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the configured database, bring its schema up to date and wrap it in
/// the store implementation
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseImpl> {
    let pool = open_local(&config.path, config.max_connections).await?;

    let conn = pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {e}"))?;
    initialize_database(&conn).await?;
    drop(conn);

    tracing::info!(path = %config.path, "Database ready");
    Ok(DatabaseImpl::new_from_pool(pool))
}
