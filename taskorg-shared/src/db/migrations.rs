//! Schema migrations for the document store
//!
//! Migrations live in `taskorg-shared/migrations/` and are embedded at
//! compile time with `sqlx::migrate!`. The schema is a single `documents`
//! table plus the trigger that publishes change notifications on the
//! `document_changes` channel.
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::db::migrations::{ensure_database_exists, run_migrations};
//! use taskorg_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example(url: &str) -> Result<(), Box<dyn std::error::Error>> {
//! ensure_database_exists(url).await?;
//! let pool = create_pool(DatabaseConfig::with_url(url)).await?;
//! run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applies all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running document store migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Document store schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Creates the database named in `database_url` when it is missing
///
/// Meant for development setups; production databases are provisioned
/// out of band.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
        return Ok(());
    }

    info!("Database does not exist, creating it");
    Postgres::create_database(database_url).await?;
    Ok(())
}
