//! Role resolution
//!
//! Turns a session credential into an [`Identity`] with a normalized role
//! set, consulting the caller's cache before the identity provider:
//!
//! ```text
//! no credential            -> anonymous {public}
//! cache hit, fresh         -> cached identity, provider not contacted
//! cache miss or stale      -> provider
//!     no email             -> anonymous, not cached
//!     email                -> user store roles (or defaults), normalized, cached
//!     provider error       -> Err (callers fall back to anonymous)
//! ```

use crate::error::IdentityResult;
use crate::identity::cache::{CacheKey, CachePolicy, SessionCache, SessionCacheEntry};
use crate::identity::provider::{IdentityProvider, UserDirectory};
use crate::identity::types::{
    ADMIN_ROLE, Credential, Identity, PUBLIC_ROLE, RoleSet, VerifiedClaims,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Roles given to a logged-in user the user store does not know
pub const DEFAULT_USER_ROLES: &str = "public,protected";

/// Resolves callers' identities and roles
pub struct RoleResolver {
    provider: Arc<dyn IdentityProvider>,
    directory: Option<Arc<dyn UserDirectory>>,
    policy: CachePolicy,
    admin_email: Option<String>,
    default_roles: RoleSet,
}

impl RoleResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: CachePolicy) -> Self {
        Self {
            provider,
            directory: None,
            policy,
            admin_email: None,
            default_roles: RoleSet::parse(DEFAULT_USER_ROLES),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Email that receives the `admin` role; blank disables injection
    pub fn with_admin_email(mut self, email: Option<String>) -> Self {
        self.admin_email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self
    }

    pub fn with_default_roles(mut self, roles: RoleSet) -> Self {
        self.default_roles = roles;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Resolve the caller's identity
    ///
    /// `now` is unix seconds, used for cache freshness.
    #[instrument(skip_all, fields(anonymous = credential.is_none()))]
    pub async fn resolve<C>(
        &self,
        credential: Option<&Credential>,
        cache: &mut C,
        now: u64,
    ) -> IdentityResult<Identity>
    where
        C: SessionCache + Send + ?Sized,
    {
        let Some(credential) = credential else {
            return Ok(Identity::anonymous());
        };

        let key = CacheKey::for_credential(credential);
        if let Some(entry) = cache.get(&key)
            && self.policy.is_fresh(&entry, now)
        {
            trace!(key = key.as_str(), "Identity cache hit");
            return Ok(entry.identity);
        }

        debug!(
            key = key.as_str(),
            provider = self.provider.provider_type(),
            "Identity cache miss, verifying credential"
        );
        let claims = self.provider.verify(credential).await?;

        let Some(email) = claims.email.clone().filter(|e| !e.trim().is_empty()) else {
            debug!("Verified credential carries no email, treating caller as public");
            return Ok(Identity::anonymous());
        };

        let identity = self.build_identity(email, claims).await?;
        cache.put(key, SessionCacheEntry::new(identity.clone(), now));
        Ok(identity)
    }

    /// Drop the cached identity for a credential
    pub fn forget<C>(&self, credential: &Credential, cache: &mut C) -> bool
    where
        C: SessionCache + ?Sized,
    {
        cache.remove(&CacheKey::for_credential(credential))
    }

    async fn build_identity(&self, email: String, claims: VerifiedClaims) -> IdentityResult<Identity> {
        let record = match &self.directory {
            Some(directory) => directory.lookup(&email).await?,
            None => None,
        };

        let (stored_roles, record_name, record_picture, enabled) = match record {
            Some(record) => (
                RoleSet::parse(&record.roles),
                record.name,
                record.picture,
                record.enabled,
            ),
            None => (self.default_roles.clone(), None, None, true),
        };

        let roles = if enabled {
            self.normalize_roles(&email, stored_roles)
        } else {
            debug!(email = %email, "User is disabled, granting public only");
            RoleSet::public()
        };

        Ok(Identity {
            display_name: claims
                .name
                .or(record_name)
                .unwrap_or_else(|| email.clone()),
            picture: claims.picture.or(record_picture).unwrap_or_default(),
            email: Some(email),
            roles,
            enabled,
        })
    }

    /// Ensure `public`, and `admin` for the configured administrator
    fn normalize_roles(&self, email: &str, mut roles: RoleSet) -> RoleSet {
        roles.insert(PUBLIC_ROLE);
        if let Some(admin) = &self.admin_email
            && admin.eq_ignore_ascii_case(email.trim())
        {
            roles.insert(ADMIN_ROLE);
        }
        roles
    }
}
