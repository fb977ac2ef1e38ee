//! Database migration command.
//!
//! Applies `crates/storefront/migrations/` (the `shop` schema) and then
//! creates the session store table used by `tower-sessions`.
//!
//! ```text
//! migrations/
//! ├── 20261019000001_create_catalog.sql
//! └── 20261019000002_create_orders.sql
//! ```

use tower_sessions_sqlx_store::PostgresStore;

use threadline_storefront::db;

use super::{MissingDatabaseUrl, database_url};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all storefront migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running shop migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session store table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
