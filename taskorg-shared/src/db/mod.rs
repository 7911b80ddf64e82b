//! Database plumbing for the PostgreSQL document store
//!
//! # Modules
//!
//! - `pool`: Connection pool creation and health checks
//! - `migrations`: Schema migrations for the `documents` table
//!
//! The document abstraction itself lives in [`crate::store`].
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::db::pool::{create_pool, DatabaseConfig};
//! use taskorg_shared::db::migrations::run_migrations;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::with_url(std::env::var("DATABASE_URL")?)).await?;
//! run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod pool;
