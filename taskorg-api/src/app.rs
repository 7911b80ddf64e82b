//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskorg_api::{app::{build_router, AppState}, config::Config};
//! use taskorg_shared::policy::{PermitClient, PermitConfig};
//! use taskorg_shared::store::MemoryDocumentStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let policy = PermitClient::new(PermitConfig::from_env()?)?;
//! let state = AppState::new(Arc::new(MemoryDocumentStore::new()), Arc::new(policy), config);
//! let app = build_router(state);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use taskorg_shared::policy::PolicyClient;
use taskorg_shared::store::DocumentStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Document store (PostgreSQL or in-memory)
    pub store: Arc<dyn DocumentStore>,

    /// Policy service client
    pub policy: Arc<dyn PolicyClient>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        policy: Arc<dyn PolicyClient>,
        config: Config,
    ) -> Self {
        Self {
            store,
            policy,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── /health
/// ├── /permit/                          # Policy service proxy
/// │   ├── POST /check
/// │   ├── POST /assign-role
/// │   ├── POST /create-relationship
/// │   ├── POST /create-resource-instance
/// │   ├── GET  /list-resources
/// │   └── POST /sync-user
/// └── /v1/
///     ├── POST   /users
///     ├── GET    /users/by-email?email=
///     ├── GET    /users/:uid/orgs/stream       (SSE)
///     ├── POST   /orgs
///     ├── GET    /orgs/:org_id/stream          (SSE)
///     ├── GET    /orgs/:org_id/access?user=
///     ├── POST   /orgs/:org_id/members
///     ├── GET    /orgs/:org_id/members/stream  (SSE)
///     ├── POST   /orgs/:org_id/tasks
///     ├── GET    /orgs/:org_id/tasks/stream?user=  (SSE)
///     ├── PATCH  /tasks/:task_id
///     ├── DELETE /tasks/:task_id
///     └── POST   /tasks/:task_id/status
/// ```
///
/// Middleware, bottom to top: request tracing, then CORS.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let permit_routes = Router::new()
        .route("/check", post(routes::permit::check))
        .route("/assign-role", post(routes::permit::assign_role))
        .route("/create-relationship", post(routes::permit::create_relationship))
        .route(
            "/create-resource-instance",
            post(routes::permit::create_resource_instance),
        )
        .route("/list-resources", get(routes::permit::list_resources))
        .route("/sync-user", post(routes::permit::sync_user));

    let user_routes = Router::new()
        .route("/", post(routes::users::sign_in))
        .route("/by-email", get(routes::users::find_by_email))
        .route("/:uid/orgs/stream", get(routes::live::user_orgs));

    let org_routes = Router::new()
        .route("/", post(routes::orgs::create_org))
        .route("/:org_id/stream", get(routes::live::org))
        .route("/:org_id/access", get(routes::orgs::check_access))
        .route("/:org_id/members", post(routes::members::add_member))
        .route("/:org_id/members/stream", get(routes::live::org_members))
        .route("/:org_id/tasks", post(routes::tasks::create_task))
        .route("/:org_id/tasks/stream", get(routes::live::org_tasks));

    let task_routes = Router::new()
        .route(
            "/:task_id",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/:task_id/status", post(routes::tasks::change_status));

    let v1_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/orgs", org_routes)
        .nest("/tasks", task_routes);

    let cors = if state.config.cors_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/permit", permit_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
