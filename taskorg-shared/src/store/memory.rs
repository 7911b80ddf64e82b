//! In-memory document store
//!
//! Keeps each collection in a `BTreeMap` behind a single `tokio::sync::RwLock`
//! and publishes a [`ChangeEvent`] after every write, so live queries behave
//! the same way they do against PostgreSQL. Used when no `DATABASE_URL` is
//! configured and throughout the test suites.

use super::{
    ChangeEvent, ChangeKind, Collection, Document, DocumentStore, Filter, StoreError, StoreResult,
    CHANGE_CHANNEL_CAPACITY,
};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{broadcast, RwLock};

type CollectionMap = BTreeMap<String, JsonValue>;

/// Process-local document store
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, CollectionMap>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn publish(&self, collection: Collection, id: &str, kind: ChangeKind) {
        // No receivers is fine: nobody is watching yet
        let _ = self.changes.send(ChangeEvent {
            collection,
            id: id.to_string(),
            kind,
        });
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn create(&self, collection: Collection, id: &str, data: JsonValue) -> StoreResult<()> {
        if !data.is_object() {
            return Err(StoreError::InvalidData(
                "document body must be a JSON object".to_string(),
            ));
        }

        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection).or_default();
            if docs.contains_key(id) {
                return Err(StoreError::AlreadyExists {
                    collection,
                    id: id.to_string(),
                });
            }
            docs.insert(id.to_string(), data);
        }

        self.publish(collection, id, ChangeKind::Insert);
        Ok(())
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, JsonValue>,
    ) -> StoreResult<()> {
        {
            let mut collections = self.collections.write().await;
            let existing = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(id))
                .and_then(JsonValue::as_object_mut)
                .ok_or_else(|| StoreError::NotFound {
                    collection,
                    id: id.to_string(),
                })?;

            for (key, value) in fields {
                existing.insert(key, value);
            }
        }

        self.publish(collection, id, ChangeKind::Update);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let removed = {
            let mut collections = self.collections.write().await;
            collections
                .get_mut(&collection)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };

        if removed {
            self.publish(collection, id, ChangeKind::Delete);
        }
        Ok(removed)
    }

    async fn query(&self, collection: Collection, filters: &[Filter]) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, data)| filters.iter().all(|filter| filter.matches(data)))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryDocumentStore::new();
        store
            .create(Collection::Users, "u1", json!({"uid": "u1"}))
            .await
            .unwrap();

        let doc = store.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.id, "u1");
        assert_eq!(doc.data["uid"], "u1");
        assert!(store.get(Collection::Orgs, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_is_guarded_by_existence() {
        let store = MemoryDocumentStore::new();
        store
            .create(Collection::Orgs, "acme", json!({"name": "Acme"}))
            .await
            .unwrap();

        let err = store
            .create(Collection::Orgs, "acme", json!({"name": "Other"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        // Original body untouched
        let doc = store.get(Collection::Orgs, "acme").await.unwrap().unwrap();
        assert_eq!(doc.data["name"], "Acme");
    }

    #[tokio::test]
    async fn test_create_rejects_non_objects() {
        let store = MemoryDocumentStore::new();
        let err = store
            .create(Collection::Tasks, "t1", json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_merge_updates_fields_and_requires_existing() {
        let store = MemoryDocumentStore::new();
        store
            .create(Collection::Tasks, "t1", json!({"name": "Old", "status": "todo"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("completed"));
        store.merge(Collection::Tasks, "t1", fields.clone()).await.unwrap();

        let doc = store.get(Collection::Tasks, "t1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "completed");
        assert_eq!(doc.data["name"], "Old");

        let err = store.merge(Collection::Tasks, "t2", fields).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryDocumentStore::new();
        store
            .create(Collection::Tasks, "t1", json!({"name": "x"}))
            .await
            .unwrap();

        assert!(store.delete(Collection::Tasks, "t1").await.unwrap());
        assert!(!store.delete(Collection::Tasks, "t1").await.unwrap());
        assert!(!store.exists(Collection::Tasks, "t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_query_applies_all_filters() {
        let store = MemoryDocumentStore::new();
        store
            .create(Collection::Tasks, "t1", json!({"orgId": "acme", "participants": ["u1", "u2"]}))
            .await
            .unwrap();
        store
            .create(Collection::Tasks, "t2", json!({"orgId": "acme", "participants": ["u3"]}))
            .await
            .unwrap();
        store
            .create(Collection::Tasks, "t3", json!({"orgId": "globex", "participants": ["u2"]}))
            .await
            .unwrap();

        let docs = store
            .query(
                Collection::Tasks,
                &[
                    Filter::eq("orgId", "acme"),
                    Filter::array_contains("participants", "u2"),
                ],
            )
            .await
            .unwrap();

        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);

        let all = store.query(Collection::Tasks, &[]).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(store.query(Collection::Users, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_publish_change_events() {
        let store = MemoryDocumentStore::new();
        let mut changes = store.changes();

        store
            .create(Collection::Memberships, "acme_u1", json!({"orgId": "acme"}))
            .await
            .unwrap();
        store
            .merge(Collection::Memberships, "acme_u1", Map::new())
            .await
            .unwrap();
        store.delete(Collection::Memberships, "acme_u1").await.unwrap();
        // Deleting a missing document is not a change
        store.delete(Collection::Memberships, "acme_u1").await.unwrap();

        let kinds: Vec<_> = (0..3).map(|_| changes.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
        );
        assert!(changes.try_recv().is_err());
    }
}
