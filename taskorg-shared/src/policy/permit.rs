//! Permit.io implementation of [`PolicyClient`]
//!
//! Permission checks go to the policy decision point (PDP):
//!
//! ```text
//! POST {pdp_url}/allowed
//! {"user": {"key": "u1"}, "action": "create", "resource": {"type": "Task", "tenant": "default"}, "context": {}}
//! -> {"allow": true}
//! ```
//!
//! Facts are written through the REST API under
//! `{api_url}/v2/facts/{project}/{environment}/`: `role_assignments`,
//! `resource_instances`, `relationship_tuples` and `users/{key}`. Every
//! request carries `Authorization: Bearer {token}`.
//!
//! # Environment Variables
//!
//! - `PERMIT_TOKEN`: API secret (required)
//! - `PERMIT_PDP_URL`: PDP base URL (default: http://localhost:7766)
//! - `PERMIT_API_URL`: REST API base URL (default: https://api.permit.io)
//! - `PERMIT_PROJECT`: project key (default: default)
//! - `PERMIT_ENVIRONMENT`: environment key (default: production)
//! - `PERMIT_TENANT`: tenant for checks and writes (default: default)

use super::{
    PolicyClient, PolicyError, PolicyResult, RelationshipTuple, ResourceInstance, ResourceRef,
    RoleAssignment, SyncUser, DEFAULT_TENANT,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::env;
use std::fmt;

/// Connection settings for Permit.io
#[derive(Clone)]
pub struct PermitConfig {
    pub token: String,
    pub pdp_url: String,
    pub api_url: String,
    pub project: String,
    pub environment: String,
    pub tenant: String,
}

impl PermitConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            pdp_url: "http://localhost:7766".to_string(),
            api_url: "https://api.permit.io".to_string(),
            project: "default".to_string(),
            environment: "production".to_string(),
            tenant: DEFAULT_TENANT.to_string(),
        }
    }

    /// Loads settings from `PERMIT_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::Config` when `PERMIT_TOKEN` is missing or empty.
    pub fn from_env() -> PolicyResult<Self> {
        let token = env::var("PERMIT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                PolicyError::Config("PERMIT_TOKEN environment variable is required".to_string())
            })?;

        let defaults = Self::new(token);
        let var = |name: &str, default: String| env::var(name).unwrap_or(default);

        Ok(Self {
            pdp_url: var("PERMIT_PDP_URL", defaults.pdp_url.clone()),
            api_url: var("PERMIT_API_URL", defaults.api_url.clone()),
            project: var("PERMIT_PROJECT", defaults.project.clone()),
            environment: var("PERMIT_ENVIRONMENT", defaults.environment.clone()),
            tenant: var("PERMIT_TENANT", defaults.tenant.clone()),
            token: defaults.token,
        })
    }
}

// Keeps the token out of logs
impl fmt::Debug for PermitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermitConfig")
            .field("token", &"<redacted>")
            .field("pdp_url", &self.pdp_url)
            .field("api_url", &self.api_url)
            .field("project", &self.project)
            .field("environment", &self.environment)
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// HTTP client for the Permit PDP and REST API
#[derive(Debug, Clone)]
pub struct PermitClient {
    config: PermitConfig,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct AllowedResponse {
    allow: bool,
}

impl PermitClient {
    /// # Errors
    ///
    /// Returns `PolicyError::Config` when a base URL does not parse, and
    /// `PolicyError::Http` when the HTTP client cannot be built.
    pub fn new(config: PermitConfig) -> PolicyResult<Self> {
        for base in [&config.pdp_url, &config.api_url] {
            Url::parse(base)
                .map_err(|e| PolicyError::Config(format!("invalid URL {}: {}", base, e)))?;
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("taskorg/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &PermitConfig {
        &self.config
    }

    /// URL of a fact endpoint, one path segment per element of `path`
    fn facts_url(&self, path: &[&str]) -> PolicyResult<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| PolicyError::Config(format!("invalid API URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| PolicyError::Config("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v2", "facts", self.config.project.as_str(), self.config.environment.as_str()])
            .extend(path);

        Ok(url)
    }

    /// URL of a PDP endpoint
    fn pdp_url(&self, endpoint: &str) -> PolicyResult<Url> {
        let base = self.config.pdp_url.trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, endpoint))
            .map_err(|e| PolicyError::Config(format!("invalid PDP URL: {}", e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.config.token)
    }

    /// Sends a request and decodes the JSON body
    ///
    /// Any non-2xx status becomes `PolicyError::Api` with the response text.
    async fn send(&self, request: RequestBuilder) -> PolicyResult<JsonValue> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PolicyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn tenant_or_default<'a>(&'a self, tenant: &'a Option<String>) -> &'a str {
        tenant.as_deref().unwrap_or(&self.config.tenant)
    }
}

#[async_trait]
impl PolicyClient for PermitClient {
    async fn check(
        &self,
        user: &str,
        action: &str,
        resource: &ResourceRef,
        context: Option<JsonValue>,
    ) -> PolicyResult<bool> {
        let mut resource_body = json!({
            "type": resource.resource_type,
            "tenant": self.config.tenant,
        });
        if let Some(key) = &resource.key {
            resource_body["key"] = JsonValue::from(key.as_str());
        }

        let body = json!({
            "user": { "key": user },
            "action": action,
            "resource": resource_body,
            "context": context.unwrap_or_else(|| json!({})),
        });

        let url = self.pdp_url("allowed")?;
        let response = self.send(self.request(Method::POST, url).json(&body)).await?;
        let decision: AllowedResponse = serde_json::from_value(response)?;

        tracing::debug!(
            user,
            action,
            resource = %resource,
            allow = decision.allow,
            "Permission check"
        );
        Ok(decision.allow)
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> PolicyResult<JsonValue> {
        let mut body = json!({
            "user": assignment.user,
            "role": assignment.role,
            "tenant": self.tenant_or_default(&assignment.tenant),
        });
        if let Some(instance) = assignment.instance() {
            body["resource_instance"] = JsonValue::from(instance);
        }

        let url = self.facts_url(&["role_assignments"])?;
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn create_resource_instance(&self, instance: ResourceInstance) -> PolicyResult<JsonValue> {
        let body = json!({
            "key": instance.key,
            "resource": instance.resource,
            "tenant": self.tenant_or_default(&instance.tenant),
        });

        let url = self.facts_url(&["resource_instances"])?;
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn create_relationship(&self, tuple: RelationshipTuple) -> PolicyResult<JsonValue> {
        let body = json!({
            "subject": tuple.subject,
            "relation": tuple.relation,
            "object": tuple.object,
            "tenant": self.config.tenant,
        });

        let url = self.facts_url(&["relationship_tuples"])?;
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn list_resource_instances(&self) -> PolicyResult<JsonValue> {
        let url = self.facts_url(&["resource_instances"])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn sync_user(&self, user: SyncUser) -> PolicyResult<JsonValue> {
        let url = self.facts_url(&["users", &user.key])?;
        self.send(self.request(Method::PUT, url).json(&user)).await
    }
}
