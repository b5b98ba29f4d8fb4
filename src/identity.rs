//! Identity snapshots and the upstream provider seam.
//!
//! The guard never talks HTTP directly; it goes through [`IdentityProvider`].
//! `HttpIdentityProvider` is the production implementation against the admin
//! API, `StaticIdentityProvider` serves tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::errors::GateError;
use crate::nav::errors::NavError;

/// Authenticated user's roles + grants snapshot. Immutable once built;
/// refreshes replace the whole value, nothing mutates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

impl Identity {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            roles: Vec::new(),
            permissions: Vec::new(),
            status: default_status(),
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Token + identity pair returned by a successful login.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub token: String,
    pub identity: Identity,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a token and an identity snapshot.
    async fn authenticate(&self, credentials: &Credentials)
        -> Result<AuthenticatedSession, NavError>;

    /// Fetch a fresh identity snapshot for the given token.
    async fn fetch_identity(&self, token: &str) -> Result<Identity, NavError>;

    /// Invalidate the token upstream. Best-effort; callers may ignore failure.
    async fn logout(&self, token: &str) -> Result<(), NavError>;
}

// ---------- HTTP implementation ----------

/// Upstream response envelope: `{ success, data, message, code }`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    token: String,
    user_info: Identity,
}

pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map upstream HTTP failures onto the local taxonomy: 401 means the
    /// credential is dead, 403 means the caller lacks access, anything else
    /// is a fetch failure the guard treats as expiry anyway.
    fn classify(status: StatusCode, path: &str, message: Option<String>) -> NavError {
        match status {
            StatusCode::UNAUTHORIZED => NavError::AuthExpired,
            StatusCode::FORBIDDEN => NavError::AccessDenied {
                path: path.to_string(),
            },
            _ => NavError::IdentityFetchFailed(
                message.unwrap_or_else(|| format!("upstream returned {status}")),
            ),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticatedSession, NavError> {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| NavError::IdentityFetchFailed(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<LoginData> = response
            .json()
            .await
            .map_err(|e| NavError::IdentityFetchFailed(e.to_string()))?;

        if !status.is_success() || !body.success {
            return Err(Self::classify(status, "/api/auth/login", body.message));
        }

        let data = body
            .data
            .ok_or_else(|| NavError::IdentityFetchFailed("login response had no data".into()))?;

        Ok(AuthenticatedSession {
            token: data.token,
            identity: data.user_info,
        })
    }

    async fn fetch_identity(&self, token: &str) -> Result<Identity, NavError> {
        let response = self
            .client
            .get(self.url("/api/auth/user"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| NavError::IdentityFetchFailed(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<Identity> = response
            .json()
            .await
            .map_err(|e| NavError::IdentityFetchFailed(e.to_string()))?;

        if !status.is_success() || !body.success {
            return Err(Self::classify(status, "/api/auth/user", body.message));
        }

        body.data
            .ok_or_else(|| NavError::IdentityFetchFailed("user response had no data".into()))
    }

    async fn logout(&self, token: &str) -> Result<(), NavError> {
        let response = self
            .client
            .post(self.url("/api/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| NavError::IdentityFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify(response.status(), "/api/auth/logout", None));
        }
        Ok(())
    }
}

// ---------- Static implementation ----------

/// In-memory provider with a fixed user table. Issues opaque tokens and
/// remembers which identity each token belongs to.
pub struct StaticIdentityProvider {
    users: HashMap<String, (String, Identity)>,
    issued: Mutex<HashMap<String, Identity>>,
    counter: AtomicU64,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            issued: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_user(mut self, password: &str, identity: Identity) -> Self {
        self.users
            .insert(identity.username.clone(), (password.to_string(), identity));
        self
    }

    /// Pre-seed a token, as if a previous tab had logged in.
    pub fn seed_token(&self, token: &str, identity: Identity) {
        self.issued
            .lock()
            .unwrap()
            .insert(token.to_string(), identity);
    }

    /// Drop every issued token, simulating upstream-side expiry.
    pub fn revoke_all(&self) {
        self.issued.lock().unwrap().clear();
    }
}

impl Default for StaticIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticatedSession, NavError> {
        let (password, identity) = self
            .users
            .get(&credentials.username)
            .ok_or(NavError::AuthExpired)?;
        if *password != credentials.password {
            return Err(NavError::AuthExpired);
        }

        let token = format!("static-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.issued
            .lock()
            .unwrap()
            .insert(token.clone(), identity.clone());

        Ok(AuthenticatedSession {
            token,
            identity: identity.clone(),
        })
    }

    async fn fetch_identity(&self, token: &str) -> Result<Identity, NavError> {
        self.issued
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(NavError::AuthExpired)
    }

    async fn logout(&self, token: &str) -> Result<(), NavError> {
        self.issued.lock().unwrap().remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticIdentityProvider {
        StaticIdentityProvider::new().with_user(
            "secret",
            Identity::new(1, "alice").with_permissions(&["user:view"]),
        )
    }

    #[tokio::test]
    async fn test_authenticate_and_fetch() {
        let p = provider();
        let session = p
            .authenticate(&Credentials {
                username: "alice".into(),
                password: "secret".into(),
            })
            .await
            .unwrap();

        let identity = p.fetch_identity(&session.token).await.unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.permissions, vec!["user:view"]);
    }

    #[tokio::test]
    async fn test_bad_password_rejected() {
        let p = provider();
        let err = p
            .authenticate(&Credentials {
                username: "alice".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::AuthExpired));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let p = provider();
        let session = p
            .authenticate(&Credentials {
                username: "alice".into(),
                password: "secret".into(),
            })
            .await
            .unwrap();

        p.logout(&session.token).await.unwrap();
        let err = p.fetch_identity(&session.token).await.unwrap_err();
        assert!(matches!(err, NavError::AuthExpired));
    }

    #[test]
    fn test_identity_deserializes_with_defaults() {
        let identity: Identity =
            serde_json::from_str(r#"{ "id": 7, "username": "bob" }"#).unwrap();
        assert_eq!(identity.status, "active");
        assert!(identity.roles.is_empty());
        assert!(identity.permissions.is_empty());
    }
}
