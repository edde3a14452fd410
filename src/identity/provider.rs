//! Identity provider and user store clients
//!
//! The identity provider turns a raw session credential into verified
//! `{email, name, picture}` claims. The user store maps an email to the
//! roles stored for that user. Both are external services; the gateway
//! only talks to them through these traits.

use crate::error::{IdentityError, IdentityResult};
use crate::identity::types::{Credential, UserRecord, VerifiedClaims};
// async_trait required for dyn-compatibility with Arc<dyn IdentityProvider>
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Verifies session credentials
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a credential
    ///
    /// Returns `InvalidCredential` for expired, revoked or malformed
    /// credentials. Claims without an email are a valid, unauthenticated
    /// result.
    async fn verify(&self, credential: &Credential) -> IdentityResult<VerifiedClaims>;

    /// Description for logging
    fn provider_type(&self) -> &'static str;
}

/// Looks up stored users by email
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when the user is not known to the store
    async fn lookup(&self, email: &str) -> IdentityResult<Option<UserRecord>>;
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    credential: &'a str,
}

fn http_client(timeout: Duration) -> IdentityResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(format!("gatekeeper/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(IdentityError::Request)
}

/// Identity provider reached over HTTP
///
/// POSTs `{"credential": "..."}` to the verify URL and expects
/// `{"email": ..., "name": ..., "picture": ...}` back.
pub struct HttpIdentityProvider {
    http: Client,
    verify_url: String,
}

impl HttpIdentityProvider {
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> IdentityResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            verify_url: verify_url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip_all, fields(url = %self.verify_url))]
    async fn verify(&self, credential: &Credential) -> IdentityResult<VerifiedClaims> {
        let response = self
            .http
            .post(&self.verify_url)
            .json(&VerifyRequest {
                credential: credential.expose(),
            })
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::from_provider_status(status.as_u16(), &body));
        }

        let claims: VerifiedClaims = response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("invalid claims: {}", e)))?;

        debug!(email = ?claims.email, "Credential verified");
        Ok(claims)
    }

    fn provider_type(&self) -> &'static str {
        "http"
    }
}

/// User store reached over HTTP: `GET {base}/users/{email}`
pub struct HttpUserDirectory {
    http: Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> IdentityResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn user_url(&self, email: &str) -> String {
        format!("{}/users/{}", self.base_url, urlencoding::encode(email))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    #[instrument(skip(self))]
    async fn lookup(&self, email: &str) -> IdentityResult<Option<UserRecord>> {
        let response = self
            .http
            .get(self.user_url(email))
            .send()
            .await
            .map_err(|e| IdentityError::Directory(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| IdentityError::Directory(format!("invalid user record: {}", e))),
            status => Err(IdentityError::Directory(format!("HTTP {}", status.as_u16()))),
        }
    }
}

/// User store backed by configuration
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, UserRecord>,
}

impl StaticUserDirectory {
    pub fn new(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (record.email.to_lowercase(), record))
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn lookup(&self, email: &str) -> IdentityResult<Option<UserRecord>> {
        Ok(self.users.get(&email.to_lowercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str, roles: &str) -> UserRecord {
        UserRecord {
            email: email.to_string(),
            name: None,
            picture: None,
            roles: roles.to_string(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_static_directory_lookup_is_case_insensitive() {
        let directory = StaticUserDirectory::new([record("Alice@Example.com", "public,photos")]);

        let found = directory.lookup("alice@example.com").await.unwrap();
        assert_eq!(found.unwrap().roles, "public,photos");

        assert!(directory.lookup("bob@example.com").await.unwrap().is_none());
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_user_url_encodes_email() {
        let directory =
            HttpUserDirectory::new("http://users.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            directory.user_url("a+b@example.com"),
            "http://users.local/users/a%2Bb%40example.com"
        );
    }
}
