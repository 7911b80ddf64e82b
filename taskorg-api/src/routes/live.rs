//! Live feeds over Server-Sent Events
//!
//! Each endpoint starts a live query and forwards every delivery as one
//! `snapshot` event carrying the full current list:
//!
//! ```text
//! event: snapshot
//! data: [{"id":"u1","displayName":"Ada","email":"ada@example.com","photoURL":null,"role":"admin"}]
//! ```
//!
//! A keep-alive comment goes out every 25 seconds. The subscription lives
//! inside the response stream, so closing the connection stops it. A slow
//! client only ever receives the latest snapshot; older ones are replaced.
//!
//! | endpoint | payload |
//! |---|---|
//! | `GET /v1/users/:uid/orgs/stream` | organizations of the user, each with its members |
//! | `GET /v1/orgs/:org_id/stream` | the organization with its members, or `null` |
//! | `GET /v1/orgs/:org_id/members/stream` | members joined with their user records |
//! | `GET /v1/orgs/:org_id/tasks/stream?user=` | the user's tasks, each with `relation` |

use crate::app::AppState;
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use taskorg_shared::live;
use taskorg_shared::store::Subscription;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt as _;

#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    pub user: String,
}

pub async fn user_orgs(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(uid = %uid, "Streaming user organizations");

    let (tx, rx) = watch::channel(None);
    let subscription = live::watch_user_orgs(Arc::clone(&state.store), &uid, move |orgs| {
        tx.send_replace(Some(orgs));
    });
    snapshots(rx, subscription)
}

pub async fn org(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(org_id = %org_id, "Streaming organization");

    let (tx, rx) = watch::channel(None);
    let subscription = live::watch_org(Arc::clone(&state.store), &org_id, move |org| {
        tx.send_replace(Some(org));
    });
    snapshots(rx, subscription)
}

pub async fn org_members(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(org_id = %org_id, "Streaming organization members");

    let (tx, rx) = watch::channel(None);
    let subscription = live::watch_org_members(Arc::clone(&state.store), &org_id, move |members| {
        tx.send_replace(Some(members));
    });
    snapshots(rx, subscription)
}

pub async fn org_tasks(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(query): Query<TasksQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(org_id = %org_id, user = %query.user, "Streaming user tasks");

    let (tx, rx) = watch::channel(None);
    let subscription =
        live::watch_user_org_tasks(Arc::clone(&state.store), &query.user, &org_id, move |tasks| {
            tx.send_replace(Some(tasks));
        });
    snapshots(rx, subscription)
}

/// Turns deliveries into `snapshot` events
fn snapshots<T>(
    rx: watch::Receiver<Option<T>>,
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let stream = latest(rx, subscription).map(|snapshot| Ok(snapshot_event(&snapshot)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(25)))
}

/// Latest delivery each time the stream is polled, holding `subscription`
/// for as long as the stream lives
///
/// `rx` starts at `None` until the first delivery. Ends when the
/// subscription's task drops the sender.
fn latest<T>(rx: watch::Receiver<Option<T>>, subscription: Subscription) -> impl Stream<Item = T>
where
    T: Clone + Send + Sync + 'static,
{
    WatchStream::new(rx).filter_map(move |snapshot| {
        let _subscription = &subscription;
        snapshot
    })
}

fn snapshot_event<T: Serialize>(snapshot: &T) -> Event {
    match Event::default().event("snapshot").json_data(snapshot) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode snapshot");
            Event::default().event("error").data("Failed to encode snapshot")
        }
    }
}
