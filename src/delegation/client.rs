//! Delegation client
//!
//! Forwards an authorization question to the service that owns the
//! resource: `GET http://{target}/authorize` with the original request
//! described in `X-Forwarded-*` headers and the caller's roles attached.
//! Any 2xx answer allows; everything else, including every transport
//! failure, denies. Redirects are never followed: a 3xx is a denial.

use crate::error::{DelegationError, TransportError};
use crate::identity::{Credential, RoleSet};
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Default time allowed for a delegated decision
pub const DEFAULT_DELEGATION_TIMEOUT: Duration = Duration::from_secs(5);

pub const X_FORWARDED_URI: HeaderName = HeaderName::from_static("x-forwarded-uri");
pub const X_FORWARDED_ROLES: HeaderName = HeaderName::from_static("x-forwarded-roles");
pub const X_FORWARDED_METHOD: HeaderName = HeaderName::from_static("x-forwarded-method");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// The original request, as described by the reverse proxy
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: Option<String>,
    pub host: Option<String>,
    pub proto: Option<String>,
    pub user_agent: Option<String>,
    pub credential: Option<Credential>,
}

impl RequestContext {
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }
}

/// Authorize endpoint of a delegation target (`host[:port]`)
pub fn authorize_url(target: &str) -> Result<Url, DelegationError> {
    Url::parse(&format!("http://{}/authorize", target)).map_err(|e| {
        DelegationError::InvalidRequest {
            target: target.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Client for delegated authorization
#[derive(Debug, Clone)]
pub struct DelegationClient {
    http: Client,
    timeout: Duration,
    credential_cookie: String,
}

impl DelegationClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            http,
            timeout,
            credential_cookie: "session".to_string(),
        })
    }

    /// Name of the cookie the credential is forwarded in
    pub fn with_credential_cookie(mut self, name: impl Into<String>) -> Self {
        self.credential_cookie = name.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask `target` whether the caller may access `path`
    ///
    /// Fails closed: the result is `true` only for a 2xx answer. Dropping
    /// the returned future abandons the outbound request.
    #[instrument(skip(self, target, roles, ctx), fields(delegate = %target))]
    pub async fn delegate(
        &self,
        target: &str,
        path: &str,
        roles: &RoleSet,
        ctx: &RequestContext,
    ) -> bool {
        match self.try_delegate(target, path, roles, ctx).await {
            Ok(()) => {
                debug!(path, "Delegated authorization granted");
                true
            }
            Err(e @ DelegationError::Rejected { .. }) => {
                debug!(path, error = %e, "Delegated authorization refused");
                false
            }
            Err(e) => {
                error!(path, class = e.class(), error = %e, "Delegation failed, denying");
                false
            }
        }
    }

    async fn try_delegate(
        &self,
        target: &str,
        path: &str,
        roles: &RoleSet,
        ctx: &RequestContext,
    ) -> Result<(), DelegationError> {
        let url = authorize_url(target)?;
        let headers = self.forwarded_headers(target, path, roles, ctx)?;

        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.classify(target, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DelegationError::Rejected {
                target: target.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn forwarded_headers(
        &self,
        target: &str,
        path: &str,
        roles: &RoleSet,
        ctx: &RequestContext,
    ) -> Result<HeaderMap, DelegationError> {
        let value = |v: &str| {
            HeaderValue::from_str(v).map_err(|e| DelegationError::InvalidRequest {
                target: target.to_string(),
                reason: e.to_string(),
            })
        };

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_URI, value(path)?);
        headers.insert(X_FORWARDED_ROLES, value(&roles.to_header_value())?);
        headers.insert(
            X_FORWARDED_PROTO,
            value(ctx.proto.as_deref().unwrap_or("http"))?,
        );
        if let Some(method) = &ctx.method {
            headers.insert(X_FORWARDED_METHOD, value(method)?);
        }
        if let Some(host) = &ctx.host {
            headers.insert(X_FORWARDED_HOST, value(host)?);
        }
        if let Some(agent) = &ctx.user_agent {
            headers.insert(USER_AGENT, value(agent)?);
        }
        if let Some(credential) = &ctx.credential {
            let mut cookie = value(&format!(
                "{}={}",
                self.credential_cookie,
                credential.expose()
            ))?;
            cookie.set_sensitive(true);
            headers.insert(COOKIE, cookie);
        }
        Ok(headers)
    }

    fn classify(&self, target: &str, e: reqwest::Error) -> DelegationError {
        let target = target.to_string();
        if e.is_timeout() {
            DelegationError::Timeout {
                target,
                timeout_secs: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            DelegationError::Connect {
                target,
                reason: e.to_string(),
            }
        } else if e.is_builder() {
            DelegationError::InvalidRequest {
                target,
                reason: e.to_string(),
            }
        } else {
            DelegationError::Request { target, source: e }
        }
    }
}
