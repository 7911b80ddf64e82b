//! User records
//!
//! A user document is written once, the first time an identity signs in, and
//! keyed by the identity provider's `uid`. Later sign-ins leave it untouched.
//!
//! # Document
//!
//! ```json
//! {
//!   "uid": "u1",
//!   "displayName": "Ada",
//!   "email": "ada@example.com",
//!   "photoURL": null,
//!   "createdAt": "2025-01-01T00:00:00Z",
//!   "lastLoginAt": "2025-01-01T00:00:00Z"
//! }
//! ```

use crate::store::{to_object, Collection, DocumentStore, Filter, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity provider user id, also the document key
    pub uid: String,

    pub display_name: Option<String>,

    /// Stored trimmed and lower-cased
    pub email: Option<String>,

    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub last_login_at: DateTime<Utc>,
}

/// Identity claims used to create a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Canonical form used for storing and looking up emails
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    pub async fn find(store: &dyn DocumentStore, uid: &str) -> StoreResult<Option<Self>> {
        match store.get(Collection::Users, uid).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Writes a new user record
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` when a user with this uid exists.
    pub async fn create(store: &dyn DocumentStore, data: NewUser) -> StoreResult<Self> {
        let now = Utc::now();
        let user = User {
            uid: data.uid,
            display_name: data.display_name,
            email: data.email.as_deref().map(normalize_email),
            photo_url: data.photo_url,
            created_at: now,
            last_login_at: now,
        };

        store
            .create(Collection::Users, &user.uid, to_object(&user)?)
            .await?;

        tracing::debug!(uid = %user.uid, "User record created");
        Ok(user)
    }

    /// Looks a user up by email, returning the first match
    pub async fn find_by_email(store: &dyn DocumentStore, email: &str) -> StoreResult<Option<Self>> {
        let docs = store
            .query(Collection::Users, &[Filter::eq("email", normalize_email(email))])
            .await?;

        match docs.into_iter().next() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Name shown in member lists: display name, else email
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.email.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDocumentStore, StoreError};

    fn ada() -> NewUser {
        NewUser {
            uid: "u1".to_string(),
            display_name: Some("Ada".to_string()),
            email: Some("  Ada@Example.COM ".to_string()),
            photo_url: None,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ada@Example.COM\n"), "ada@example.com");
    }

    #[test]
    fn test_wire_field_names() {
        let user = User {
            uid: "u1".to_string(),
            display_name: None,
            email: None,
            photo_url: Some("https://img.example.com/u1.png".to_string()),
            created_at: Utc::now(),
            last_login_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("photoURL").is_some());
        assert!(value.get("displayName").is_some());
        assert!(value.get("lastLoginAt").is_some());
    }

    #[test]
    fn test_label_falls_back_to_email() {
        let mut user = User {
            uid: "u1".to_string(),
            display_name: Some(String::new()),
            email: Some("ada@example.com".to_string()),
            photo_url: None,
            created_at: Utc::now(),
            last_login_at: Utc::now(),
        };
        assert_eq!(user.label(), Some("ada@example.com"));

        user.display_name = Some("Ada".to_string());
        assert_eq!(user.label(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_create_stores_normalized_email() {
        let store = MemoryDocumentStore::new();
        let user = User::create(&store, ada()).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));

        let found = User::find_by_email(&store, "ADA@example.com ").await.unwrap();
        assert_eq!(found.map(|u| u.uid), Some("u1".to_string()));
        assert!(User::find_by_email(&store, "bob@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_is_once_only() {
        let store = MemoryDocumentStore::new();
        User::create(&store, ada()).await.unwrap();

        let err = User::create(&store, ada()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert!(User::find(&store, "u1").await.unwrap().is_some());
    }
}
