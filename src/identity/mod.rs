//! Caller identity
//!
//! Resolves a session credential into an identity with a normalized role
//! set. Resolved identities are cached in the caller's own session for a
//! fixed TTL; expired or missing entries go back to the identity provider.

pub mod cache;
pub mod provider;
pub mod resolver;
pub mod session;
pub mod types;

pub use cache::{CacheKey, CachePolicy, CallerSession, SessionCache, SessionCacheEntry};
pub use provider::{
    HttpIdentityProvider, HttpUserDirectory, IdentityProvider, StaticUserDirectory, UserDirectory,
};
pub use resolver::{DEFAULT_USER_ROLES, RoleResolver};
pub use session::{SessionHandle, SessionId, SessionStore, unix_now};
pub use types::{
    ADMIN_ROLE, Credential, Identity, PUBLIC_ROLE, RoleSet, UserRecord, VerifiedClaims,
};
