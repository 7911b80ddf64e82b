//! Document store access
//!
//! The application keeps four top-level collections of JSON documents:
//! `users`, `orgs`, `memberships` and `tasks`. Every backend implements
//! [`DocumentStore`]:
//!
//! - `get` / `create` / `merge` / `delete` on a single document
//! - `query` with equality and array-contains filters
//! - `changes` - a broadcast feed of write events, used by live queries
//!
//! `create` is guarded (fails when the id exists) and `merge` is guarded
//! (fails when the id does not exist). There are no multi-document
//! transactions; callers composing several writes get no atomicity.
//!
//! # Backends
//!
//! - [`PgDocumentStore`]: PostgreSQL JSONB table with LISTEN/NOTIFY
//! - [`MemoryDocumentStore`]: in-process maps, for development and tests
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::store::{Collection, DocumentStore, Filter, MemoryDocumentStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryDocumentStore::new();
//! store.create(Collection::Tasks, "t1", json!({"orgId": "acme", "participants": ["u1"]})).await?;
//!
//! let visible = store
//!     .query(Collection::Tasks, &[Filter::array_contains("participants", "u1")])
//!     .await?;
//! assert_eq!(visible.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod postgres;
pub mod subscription;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use subscription::{watch, Subscription, WatchTarget};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use tokio::sync::broadcast;

/// Capacity of the change broadcast channel shared by all backends
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Top-level document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Orgs,
    Memberships,
    Tasks,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Orgs => "orgs",
            Collection::Memberships => "memberships",
            Collection::Tasks => "tasks",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "users" => Some(Collection::Users),
            "orgs" => Some(Collection::Orgs),
            "memberships" => Some(Collection::Memberships),
            "tasks" => Some(Collection::Tasks),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document: its key plus the JSON object body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: JsonValue,
}

impl Document {
    /// Deserializes the document body into a typed record
    pub fn decode<T: DeserializeOwned>(self) -> StoreResult<T> {
        serde_json::from_value(self.data).map_err(StoreError::from)
    }
}

/// Query filter on a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, JsonValue),

    /// `field` is an array containing `value`
    ArrayContains(String, JsonValue),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::ArrayContains(field.into(), value.into())
    }

    /// Evaluates the filter against a document body
    pub fn matches(&self, data: &JsonValue) -> bool {
        match self {
            Filter::Eq(field, value) => data.get(field) == Some(value),
            Filter::ArrayContains(field, value) => data
                .get(field)
                .and_then(JsonValue::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
        }
    }

    /// JSONB containment object equivalent to this filter (`data @> ...`)
    pub fn containment(&self) -> JsonValue {
        let mut object = Map::new();
        match self {
            Filter::Eq(field, value) => {
                object.insert(field.clone(), value.clone());
            }
            Filter::ArrayContains(field, value) => {
                object.insert(field.clone(), JsonValue::Array(vec![value.clone()]));
            }
        }
        JsonValue::Object(object)
    }
}

/// Kind of write that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification emitted after every successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
}

/// Document store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document {collection}/{id} already exists")]
    AlreadyExists { collection: Collection, id: String },

    #[error("Document {collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("Invalid document data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed access to a document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;

    /// Fetches one document by id
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>>;

    /// Inserts a new document; fails with `AlreadyExists` if the id is taken
    async fn create(&self, collection: Collection, id: &str, data: JsonValue) -> StoreResult<()>;

    /// Shallow-merges `fields` into an existing document; fails with `NotFound`
    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, JsonValue>,
    ) -> StoreResult<()>;

    /// Hard-deletes a document, returning whether it existed
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Returns every document matching all filters
    async fn query(&self, collection: Collection, filters: &[Filter]) -> StoreResult<Vec<Document>>;

    /// Subscribes to write notifications
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;

    async fn exists(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

/// Serializes a record into a JSON object body
pub(crate) fn to_object<T: Serialize>(value: &T) -> StoreResult<JsonValue> {
    let data = serde_json::to_value(value)?;
    if !data.is_object() {
        return Err(StoreError::InvalidData(
            "document body must be a JSON object".to_string(),
        ));
    }
    Ok(data)
}
