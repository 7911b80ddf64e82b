//! Live queries over the document store
//!
//! [`watch`] runs a query once for an initial snapshot, then re-runs it and
//! hands the result to the callback once for every change event that hits the
//! watched collection (or document). Delivery stops when the returned
//! [`Subscription`] is stopped or dropped.
//!
//! Each subscription owns its own listener task; two subscriptions to the
//! same query share nothing. A fresh subscription starts from a fresh
//! snapshot and never replays changes that happened before it existed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskorg_shared::store::{watch, Collection, DocumentStore, MemoryDocumentStore, WatchTarget};
//!
//! # async fn example() {
//! let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
//! let subscription = watch(
//!     store,
//!     WatchTarget::Collection(Collection::Tasks),
//!     |store| async move { store.query(Collection::Tasks, &[]).await },
//!     |docs| println!("{} tasks", docs.len()),
//! );
//!
//! // ... later, on teardown
//! subscription.stop();
//! # }
//! ```

use super::{ChangeEvent, Collection, DocumentStore, StoreResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// Which writes re-trigger a live query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// Any write in the collection
    Collection(Collection),

    /// Writes to one document
    Document(Collection, String),
}

impl WatchTarget {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            WatchTarget::Collection(collection) => event.collection == *collection,
            WatchTarget::Document(collection, id) => {
                event.collection == *collection && event.id == *id
            }
        }
    }
}

/// Handle to a running live query
///
/// Call [`Subscription::stop`] on teardown. Dropping the handle stops it too.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    /// A handle with nothing behind it, for queries that were never started
    pub fn inert() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self { token }
    }

    /// Stops delivery and releases the listener. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts a live query
///
/// `query` is re-run against the store on every matching change; a query
/// error is logged and delivered as an empty list.
pub fn watch<T, Q, Fut, F>(
    store: Arc<dyn DocumentStore>,
    target: WatchTarget,
    query: Q,
    mut callback: F,
) -> Subscription
where
    T: Send + 'static,
    Q: Fn(Arc<dyn DocumentStore>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<Vec<T>>> + Send,
    F: FnMut(Vec<T>) + Send + 'static,
{
    let token = CancellationToken::new();
    // Subscribe before the initial snapshot so no write slips between them
    let mut changes = store.changes();
    let task_token = token.clone();

    tokio::spawn(async move {
        deliver(&store, &target, &query, &mut callback, &task_token).await;

        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(event) if target.matches(&event) => {
                        deliver(&store, &target, &query, &mut callback, &task_token).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            watch = ?target,
                            skipped,
                            "Live query fell behind, delivering one catch-up snapshot"
                        );
                        deliver(&store, &target, &query, &mut callback, &task_token).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }

        tracing::debug!(watch = ?target, "Live query stopped");
    });

    Subscription { token }
}

async fn deliver<T, Q, Fut, F>(
    store: &Arc<dyn DocumentStore>,
    target: &WatchTarget,
    query: &Q,
    callback: &mut F,
    token: &CancellationToken,
) where
    Q: Fn(Arc<dyn DocumentStore>) -> Fut,
    Fut: Future<Output = StoreResult<Vec<T>>>,
    F: FnMut(Vec<T>),
{
    let items = match query(Arc::clone(store)).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(watch = ?target, error = %e, "Live query failed");
            Vec::new()
        }
    };

    if !token.is_cancelled() {
        callback(items);
    }
}
