//! Identity cache
//!
//! Resolved identities are cached per caller, keyed by a truncated SHA-256
//! of the session credential so the raw credential never lands in the store.

use crate::identity::types::{Credential, Identity};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

/// Prefix of every cache key
pub const CACHE_KEY_PREFIX: &str = "user_info_";

/// Number of hex digits of the credential hash kept in the key
const KEY_HASH_LEN: usize = 16;

/// Default time a cached identity stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache key derived from a credential
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_credential(credential: &Credential) -> Self {
        let digest = Sha256::digest(credential.expose().as_bytes());
        let hash = hex::encode(digest);
        Self(format!("{}{}", CACHE_KEY_PREFIX, &hash[..KEY_HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A cached identity and when it was resolved (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCacheEntry {
    pub identity: Identity,
    pub cached_at: u64,
}

impl SessionCacheEntry {
    pub fn new(identity: Identity, cached_at: u64) -> Self {
        Self {
            identity,
            cached_at,
        }
    }
}

/// Freshness policy for cached identities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Fresh while `now - cached_at < ttl`
    pub fn is_fresh(&self, entry: &SessionCacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.cached_at) < self.ttl.as_secs()
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Storage for cached identities
pub trait SessionCache {
    fn get(&self, key: &CacheKey) -> Option<SessionCacheEntry>;

    fn put(&mut self, key: CacheKey, entry: SessionCacheEntry);

    /// Drop an entry, returning whether one existed
    fn remove(&mut self, key: &CacheKey) -> bool;
}

/// One caller's private cache
///
/// Owned by a single caller session, so callers can never read or evict
/// each other's entries.
#[derive(Debug, Clone, Default)]
pub struct CallerSession {
    entries: HashMap<CacheKey, SessionCacheEntry>,
    /// Unix seconds of the last request that used this session
    pub last_seen: u64,
}

impl CallerSession {
    pub fn new(now: u64) -> Self {
        Self {
            entries: HashMap::new(),
            last_seen: now,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionCache for CallerSession {
    fn get(&self, key: &CacheKey) -> Option<SessionCacheEntry> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: CacheKey, entry: SessionCacheEntry) {
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }
}
