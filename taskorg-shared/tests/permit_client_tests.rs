//! PermitClient request shapes, checked against a local fake of the PDP and
//! the facts API
//!
//! Run with: cargo test --test permit_client_tests

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};
use taskorg_shared::policy::{
    PermitClient, PermitConfig, PolicyClient, PolicyError, RelationshipTuple, ResourceInstance,
    ResourceRef, RoleAssignment, SyncUser,
};
use taskorg_shared::store::MemoryDocumentStore;
use taskorg_shared::workflows::organization::{create_organization, CreateOrganization};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: JsonValue,
}

#[derive(Clone, Default)]
struct Fake {
    requests: Arc<Mutex<Vec<Recorded>>>,
    fail_with: Option<StatusCode>,
}

async fn handle(
    State(fake): State<Fake>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    fake.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).unwrap_or(JsonValue::Null),
        path: path.clone(),
    });

    if let Some(status) = fake.fail_with {
        return (status, "project not found").into_response();
    }

    if path == "/allowed" {
        let allow = body.contains("\"u1\"");
        return Json(json!({ "allow": allow })).into_response();
    }
    if method == Method::GET {
        return Json(json!([{ "key": "acme", "resource": "Organization" }])).into_response();
    }
    Json(json!({ "ok": true })).into_response()
}

async fn start(fake: Fake) -> PermitClient {
    start_in_tenant(fake, "default").await
}

async fn start_in_tenant(fake: Fake, tenant: &str) -> PermitClient {
    let app = Router::new().fallback(handle).with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = PermitConfig::new("permit_key_test");
    config.pdp_url = format!("http://{}", addr);
    config.api_url = format!("http://{}", addr);
    config.project = "taskorg".to_string();
    config.environment = "dev".to_string();
    config.tenant = tenant.to_string();
    PermitClient::new(config).unwrap()
}

fn last(fake: &Fake) -> Recorded {
    fake.requests.lock().unwrap().last().cloned().unwrap()
}

#[tokio::test]
async fn test_check_posts_to_pdp() {
    let fake = Fake::default();
    let client = start(fake.clone()).await;

    let allowed = client
        .check("u1", "read", &ResourceRef::organization("acme"), None)
        .await
        .unwrap();
    assert!(allowed);

    let request = last(&fake);
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/allowed");
    assert_eq!(request.authorization.as_deref(), Some("Bearer permit_key_test"));
    assert_eq!(
        request.body,
        json!({
            "user": { "key": "u1" },
            "action": "read",
            "resource": { "type": "Organization", "tenant": "default", "key": "acme" },
            "context": {},
        })
    );

    let denied = client
        .check("u2", "create", &ResourceRef::kind("Task"), None)
        .await
        .unwrap();
    assert!(!denied);
    assert!(last(&fake).body["resource"].get("key").is_none());
}

#[tokio::test]
async fn test_fact_writes_hit_facts_api() {
    let fake = Fake::default();
    let client = start(fake.clone()).await;
    let task = ResourceRef::task("t1");

    client
        .assign_role(RoleAssignment::scoped("u2", "assignee", &task))
        .await
        .unwrap();
    let request = last(&fake);
    assert_eq!(request.path, "/v2/facts/taskorg/dev/role_assignments");
    assert_eq!(
        request.body,
        json!({
            "user": "u2",
            "role": "assignee",
            "tenant": "default",
            "resource_instance": "Task:t1",
        })
    );

    client
        .create_resource_instance(ResourceInstance::for_ref(&task).unwrap())
        .await
        .unwrap();
    let request = last(&fake);
    assert_eq!(request.path, "/v2/facts/taskorg/dev/resource_instances");
    assert_eq!(
        request.body,
        json!({ "key": "t1", "resource": "Task", "tenant": "default" })
    );

    client
        .create_relationship(RelationshipTuple::new(
            &ResourceRef::organization("acme"),
            "parent",
            &task,
        ))
        .await
        .unwrap();
    let request = last(&fake);
    assert_eq!(request.path, "/v2/facts/taskorg/dev/relationship_tuples");
    assert_eq!(request.body["subject"], "Organization:acme");
    assert_eq!(request.body["object"], "Task:t1");

    client
        .sync_user(SyncUser {
            key: "u1".to_string(),
            email: Some("ada@example.com".to_string()),
            first_name: Some("Ada".to_string()),
            ..SyncUser::default()
        })
        .await
        .unwrap();
    let request = last(&fake);
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.path, "/v2/facts/taskorg/dev/users/u1");
    assert_eq!(request.body["first_name"], "Ada");

    let listed = client.list_resource_instances().await.unwrap();
    assert_eq!(last(&fake).method, Method::GET);
    assert_eq!(listed[0]["key"], "acme");

    let requests = fake.requests.lock().unwrap();
    assert!(requests
        .iter()
        .all(|r| r.authorization.as_deref() == Some("Bearer permit_key_test")));
}

#[tokio::test]
async fn test_workflow_writes_use_configured_tenant() {
    let fake = Fake::default();
    let client = start_in_tenant(fake.clone(), "acme-tenant").await;
    let store = MemoryDocumentStore::new();

    let outcome = create_organization(
        &store,
        &client,
        CreateOrganization {
            name: "Acme".to_string(),
            user_id: "u1".to_string(),
        },
    )
    .await
    .unwrap();
    assert!(outcome.sync.complete);

    let requests = fake.requests.lock().unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/allowed",
            "/v2/facts/taskorg/dev/resource_instances",
            "/v2/facts/taskorg/dev/role_assignments",
        ]
    );
    assert_eq!(requests[0].body["resource"]["tenant"], "acme-tenant");
    assert_eq!(requests[1].body["tenant"], "acme-tenant");
    assert_eq!(requests[2].body["tenant"], "acme-tenant");
}

#[tokio::test]
async fn test_error_status_maps_to_api_error() {
    let fake = Fake {
        fail_with: Some(StatusCode::NOT_FOUND),
        ..Fake::default()
    };
    let client = start(fake).await;

    let err = client
        .assign_role(RoleAssignment::scoped("u1", "admin", &ResourceRef::organization("acme")))
        .await
        .unwrap_err();
    match err {
        PolicyError::Api { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "project not found");
        }
        other => panic!("expected API error, got {:?}", other),
    }

    let err = client
        .check("u1", "read", &ResourceRef::organization("acme"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_service_is_http_error() {
    let mut config = PermitConfig::new("permit_key_test");
    config.pdp_url = "http://127.0.0.1:1".to_string();
    let client = PermitClient::new(config).unwrap();

    let err = client
        .check("u1", "read", &ResourceRef::kind("Organization"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyError::Http(_)));
}
