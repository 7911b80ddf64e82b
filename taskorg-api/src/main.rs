//! # Taskorg API Server
//!
//! Serves the organization/task workflows, the Permit proxy endpoints and
//! the SSE live feeds.
//!
//! ## Usage
//!
//! ```bash
//! PERMIT_TOKEN=permit_key_... cargo run -p taskorg-api
//! ```
//!
//! Without `DATABASE_URL` the server keeps its data in memory.

use std::sync::Arc;
use taskorg_api::app::{build_router, AppState};
use taskorg_api::config::Config;
use taskorg_shared::db::migrations::{ensure_database_exists, run_migrations};
use taskorg_shared::db::pool::{create_pool, DatabaseConfig};
use taskorg_shared::policy::{PermitClient, PermitConfig};
use taskorg_shared::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskorg_api=debug,taskorg_shared=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Taskorg API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let store = open_store(&config).await?;

    let permit = PermitClient::new(PermitConfig::from_env()?)?;
    tracing::info!(
        pdp_url = %permit.config().pdp_url,
        project = %permit.config().project,
        environment = %permit.config().environment,
        "Policy client configured"
    );

    let addr = config.bind_address();
    let app = build_router(AppState::new(store, Arc::new(permit), config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let Some(database) = &config.database else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    };

    ensure_database_exists(&database.url).await?;
    let pool = create_pool(DatabaseConfig {
        max_connections: database.max_connections,
        ..DatabaseConfig::with_url(database.url.as_str())
    })
    .await?;
    run_migrations(&pool).await?;

    Ok(Arc::new(PgDocumentStore::connect(pool).await?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Keep serving; the process can still be killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
