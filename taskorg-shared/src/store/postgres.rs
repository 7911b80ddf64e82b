//! PostgreSQL document store
//!
//! All collections share one JSONB table:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection VARCHAR(64) NOT NULL,
//!     id VARCHAR(255) NOT NULL,
//!     data JSONB NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! Filters become JSONB containment predicates (`data @> '{"orgId":"acme"}'`),
//! served by a GIN index. A row trigger calls `pg_notify('document_changes', ...)`
//! on every write; [`PgDocumentStore::connect`] starts a `PgListener` task
//! that forwards those notifications into the store's broadcast channel.
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::db::pool::{create_pool, DatabaseConfig};
//! use taskorg_shared::store::PgDocumentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::with_url(std::env::var("DATABASE_URL")?)).await?;
//! let store = PgDocumentStore::connect(pool).await?;
//! # Ok(())
//! # }
//! ```

use super::{
    ChangeEvent, Collection, Document, DocumentStore, Filter, StoreError, StoreResult,
    CHANGE_CHANNEL_CAPACITY,
};
use crate::db::pool::health_check;
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::{PgListener, PgPool};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// NOTIFY channel written by the `documents_notify` trigger
pub const CHANGE_CHANNEL: &str = "document_changes";

/// Document store backed by a PostgreSQL JSONB table
pub struct PgDocumentStore {
    pool: PgPool,
    changes: broadcast::Sender<ChangeEvent>,
    listener: JoinHandle<()>,
}

impl PgDocumentStore {
    /// Wraps `pool` and starts listening for change notifications
    ///
    /// # Errors
    ///
    /// Returns an error if the listener connection cannot be established.
    pub async fn connect(pool: PgPool) -> StoreResult<Self> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let listener = tokio::spawn(forward_notifications(listener, changes.clone()));

        tracing::info!(channel = CHANGE_CHANNEL, "PostgreSQL document store ready");

        Ok(Self {
            pool,
            changes,
            listener,
        })
    }
}

impl Drop for PgDocumentStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Relays NOTIFY payloads into the broadcast channel until aborted
///
/// `PgListener::recv` reconnects on its own after a dropped connection;
/// notifications sent while disconnected are lost.
async fn forward_notifications(mut listener: PgListener, changes: broadcast::Sender<ChangeEvent>) {
    loop {
        match listener.recv().await {
            Ok(notification) => {
                match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                    Ok(event) => {
                        tracing::trace!(
                            collection = %event.collection,
                            id = %event.id,
                            kind = ?event.kind,
                            "Document change"
                        );
                        let _ = changes.send(event);
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            payload = notification.payload(),
                            "Ignoring malformed change notification"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Change listener error, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query_as::<_, (String, Json<JsonValue>)>(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, Json(data))| Document { id, data }))
    }

    async fn create(&self, collection: Collection, id: &str, data: JsonValue) -> StoreResult<()> {
        if !data.is_object() {
            return Err(StoreError::InvalidData(
                "document body must be a JSON object".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(&data))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, JsonValue>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3,
                updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(JsonValue::Object(fields)))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, collection: Collection, filters: &[Filter]) -> StoreResult<Vec<Document>> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(collection.as_str());

        for filter in filters {
            builder.push(" AND data @> ");
            builder.push_bind(Json(filter.containment()));
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder
            .build_query_as::<(String, Json<JsonValue>)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| Document { id, data })
            .collect())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await?;
        Ok(())
    }
}
