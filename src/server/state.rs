//! Shared gateway state
//!
//! Everything a request handler needs, wired from [`AppConfig`].

use crate::config::{AppConfig, SessionConfig};
use crate::decision::DecisionEngine;
use crate::delegation::DelegationClient;
use crate::error::AppError;
use crate::identity::{
    CachePolicy, Credential, HttpIdentityProvider, HttpUserDirectory, IdentityProvider,
    RoleResolver, SessionId, SessionStore, StaticUserDirectory, UserDirectory,
};
use crate::rules::RuleStore;
use axum::http::{HeaderMap, header};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Cookie names and attributes
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub credential_cookie: String,
    pub cache_cookie: String,
    pub domain: Option<String>,
    pub secure: bool,
    /// Max-Age of the session id cookie
    pub max_age: Duration,
}

impl CookieSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            credential_cookie: config.credential_cookie.clone(),
            cache_cookie: config.cache_cookie.clone(),
            domain: config.cookie_domain.clone(),
            secure: config.secure_cookies,
            max_age: config.idle_timeout(),
        }
    }

    /// The caller's credential, if any
    pub fn credential(&self, headers: &HeaderMap) -> Option<Credential> {
        cookie_value(headers, &self.credential_cookie).and_then(Credential::new)
    }

    /// The caller's session id, if it is well formed
    pub fn session_id(&self, headers: &HeaderMap) -> Option<SessionId> {
        cookie_value(headers, &self.cache_cookie).and_then(SessionId::parse)
    }

    fn attributes(&self, max_age: u64) -> String {
        format!(
            "HttpOnly; {}{}SameSite=Lax; Path=/; Max-Age={}",
            if self.secure { "Secure; " } else { "" },
            self.domain
                .as_deref()
                .map(|d| format!("Domain={}; ", d))
                .unwrap_or_default(),
            max_age
        )
    }

    /// `Set-Cookie` value issuing a session id
    pub fn session_cookie(&self, id: &SessionId) -> String {
        format!(
            "{}={}; {}",
            self.cache_cookie,
            id.as_str(),
            self.attributes(self.max_age.as_secs())
        )
    }

    /// `Set-Cookie` value expiring the credential cookie
    pub fn expired_credential_cookie(&self) -> String {
        format!("{}=; {}", self.credential_cookie, self.attributes(0))
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Value of cookie `name` in the request's `Cookie` headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(name)
                .and_then(|s| s.strip_prefix('='))
        })
}

/// Shared state for gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub resolver: Arc<RoleResolver>,
    pub sessions: Arc<SessionStore>,
    pub cookies: Arc<CookieSettings>,
}

impl AppState {
    pub fn new(
        engine: Arc<DecisionEngine>,
        resolver: Arc<RoleResolver>,
        sessions: Arc<SessionStore>,
        cookies: CookieSettings,
    ) -> Self {
        Self {
            engine,
            resolver,
            sessions,
            cookies: Arc::new(cookies),
        }
    }

    /// Wire the gateway from configuration
    ///
    /// Loads the rule file and builds the HTTP clients. Nothing is
    /// contacted until the first request.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let rules = Arc::new(RuleStore::new(&config.rules.path));

        let delegation = DelegationClient::new(config.delegation.timeout())?
            .with_credential_cookie(config.session.credential_cookie.as_str());
        let engine = Arc::new(DecisionEngine::new(rules, delegation));

        let identity = &config.identity;
        let provider: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(
            identity.provider_url.as_str(),
            identity.timeout(),
        )?);

        let mut resolver = RoleResolver::new(provider, CachePolicy::new(config.session.cache_ttl()))
            .with_admin_email(identity.admin_email.clone())
            .with_default_roles(identity.default_role_set());

        let directory: Option<Arc<dyn UserDirectory>> = match &identity.user_store_url {
            Some(url) => {
                info!(url = %url, "Using HTTP user store");
                Some(Arc::new(HttpUserDirectory::new(url, identity.timeout())?))
            }
            None if !identity.users.is_empty() => {
                let directory = StaticUserDirectory::new(identity.users.iter().cloned());
                info!(users = directory.len(), "Using configured users");
                Some(Arc::new(directory))
            }
            None => None,
        };
        if let Some(directory) = directory {
            resolver = resolver.with_directory(directory);
        }

        Ok(Self::new(
            engine,
            Arc::new(resolver),
            Arc::new(SessionStore::new(config.session.idle_timeout())),
            CookieSettings::from_config(&config.session),
        ))
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        self.engine.rules()
    }
}
