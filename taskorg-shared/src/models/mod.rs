//! Typed records stored in the document store
//!
//! Each model wraps one collection with typed `find` / `create` / list
//! helpers on top of [`DocumentStore`]. Field names on the wire are camelCase.
//!
//! # Models
//!
//! - `user`: accounts created on first sign-in (`users`)
//! - `organization`: tenant-like groupings (`orgs`)
//! - `membership`: user-organization links keyed `orgId_userId` (`memberships`)
//! - `task`: units of work inside an organization (`tasks`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskorg_shared::models::organization::Organization;
//! use taskorg_shared::store::{DocumentStore, MemoryDocumentStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
//! let org = Organization::create(store.as_ref(), "Acme", "u1").await?;
//! assert!(Organization::find(store.as_ref(), &org.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod membership;
pub mod organization;
pub mod task;
pub mod user;

use crate::store::{
    watch, Collection, Document, DocumentStore, Filter, StoreResult, Subscription, WatchTarget,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Decodes a batch of documents, dropping the ones that do not fit `T`
///
/// A single malformed document must not blank out a whole list.
pub(crate) fn decode_all<T: DeserializeOwned>(collection: Collection, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match doc.decode() {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(%collection, id = %id, error = %e, "Skipping malformed document");
                    None
                }
            }
        })
        .collect()
}

/// Lists every record of `collection` matching all `filters`
pub async fn list<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filters: &[Filter],
) -> StoreResult<Vec<T>> {
    let docs = store.query(collection, filters).await?;
    Ok(decode_all(collection, docs))
}

/// Live list of typed records matching `filters`
///
/// `callback` receives the full matching list once up front and again after
/// every write to `collection`.
pub fn subscribe_list<T, F>(
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    filters: Vec<Filter>,
    callback: F,
) -> Subscription
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(Vec<T>) + Send + 'static,
{
    let filters = Arc::new(filters);
    watch(
        store,
        WatchTarget::Collection(collection),
        move |store| {
            let filters = Arc::clone(&filters);
            async move { list::<T>(store.as_ref(), collection, &filters).await }
        },
        callback,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::membership::Membership;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[test]
    fn test_decode_all_skips_malformed() {
        let docs = vec![
            Document {
                id: "acme_u1".to_string(),
                data: json!({"orgId": "acme", "userId": "u1", "status": "invited",
                    "invitedBy": "u1", "invitedAt": "2025-01-01T00:00:00Z"}),
            },
            Document {
                id: "broken".to_string(),
                data: json!({"orgId": 42}),
            },
        ];

        let memberships: Vec<Membership> = decode_all(Collection::Memberships, docs);
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_subscribe_list_applies_filters() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = subscribe_list::<serde_json::Value, _>(
            Arc::clone(&store),
            Collection::Tasks,
            vec![Filter::array_contains("participants", "u2")],
            move |tasks| {
                let _ = tx.send(tasks.len());
            },
        );

        let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(first, Some(0));

        store
            .create(Collection::Tasks, "t1", json!({"participants": ["u1", "u2"]}))
            .await
            .unwrap();
        let second = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(second, Some(1));
    }
}
