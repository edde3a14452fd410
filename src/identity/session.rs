//! Caller session registry
//!
//! Every caller session is owned by one session id carried in its own
//! cookie. A caller that presents a credential but no live session id is
//! keyed by a digest of that credential, so proxies that never hand the
//! session cookie back to the browser still map each credential to a single
//! session. Ids the store does not know, or whose session went idle, are
//! replaced. Idle sessions are swept periodically, so the store only holds
//! active callers.

use crate::identity::cache::CallerSession;
use crate::identity::types::Credential;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default idle lifetime of a caller session
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Hex digits in a session id
const SESSION_ID_LEN: usize = 32;

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Opaque caller session id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random id (128 bits, hex)
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// Stable id for callers identified only by their credential
    pub fn for_credential(credential: &Credential) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"session|");
        hasher.update(credential.expose().as_bytes());
        let hash = hex::encode(hasher.finalize());
        Self(hash[..SESSION_ID_LEN].to_string())
    }

    /// Accept only well-formed ids from cookies
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        (s.len() == SESSION_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A caller session checked out of the store for one request
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub session: CallerSession,
    /// Whether the id was issued for this request
    pub is_new: bool,
}

/// Registry of caller sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, CallerSession>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<SessionId, CallerSession>> {
        self.sessions.read().unwrap_or_else(|poisoned| {
            warn!("session store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, CallerSession>> {
        self.sessions.write().unwrap_or_else(|poisoned| {
            warn!("session store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn is_idle(&self, session: &CallerSession, now: u64) -> bool {
        now.saturating_sub(session.last_seen) >= self.idle_timeout.as_secs()
    }

    /// Check out the caller's session, or start a new one
    ///
    /// A known, live `id` wins. Otherwise a caller with a credential gets
    /// the session keyed by that credential; only credential-less callers
    /// get a random id. The returned session is a copy; hand it back with
    /// [`SessionStore::store`].
    pub fn load(
        &self,
        id: Option<&SessionId>,
        credential: Option<&Credential>,
        now: u64,
    ) -> SessionHandle {
        let sessions = self.read_sessions();
        let live = |id: &SessionId| {
            sessions
                .get(id)
                .filter(|session| !self.is_idle(session, now))
                .cloned()
        };

        if let Some(id) = id
            && let Some(session) = live(id)
        {
            return SessionHandle {
                id: id.clone(),
                session,
                is_new: false,
            };
        }

        let Some(credential) = credential else {
            return SessionHandle {
                id: SessionId::generate(),
                session: CallerSession::new(now),
                is_new: true,
            };
        };

        let id = SessionId::for_credential(credential);
        match live(&id) {
            Some(session) => SessionHandle {
                id,
                session,
                is_new: false,
            },
            None => SessionHandle {
                id,
                session: CallerSession::new(now),
                is_new: true,
            },
        }
    }

    /// Write a caller session back
    ///
    /// Concurrent requests from one caller race here; the last write wins.
    pub fn store(&self, id: SessionId, mut session: CallerSession, now: u64) {
        session.last_seen = now;
        self.write_sessions().insert(id, session);
    }

    /// Drop a caller session entirely
    pub fn remove(&self, id: &SessionId) -> bool {
        self.write_sessions().remove(id).is_some()
    }

    /// Remove idle sessions, returning how many were dropped
    pub fn sweep(&self, now: u64) -> usize {
        let mut sessions = self.write_sessions();
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_idle(session, now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_sessions().is_empty()
    }

    /// Sweep idle sessions every `interval` until cancelled
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        ct: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ct.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep(unix_now());
                        if removed > 0 {
                            debug!(removed, remaining = self.len(), "Swept idle sessions");
                        }
                    }
                }
            }
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::cache::{CacheKey, SessionCache, SessionCacheEntry};
    use crate::identity::types::{Credential, Identity};

    #[test]
    fn test_session_id_parse() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert_eq!(SessionId::parse(id.as_str()), Some(id));

        assert!(SessionId::parse("short").is_none());
        assert!(SessionId::parse(&"z".repeat(SESSION_ID_LEN)).is_none());
    }

    #[test]
    fn test_unknown_id_gets_fresh_session() {
        let store = SessionStore::default();
        let forged = SessionId::parse(&"a".repeat(SESSION_ID_LEN)).unwrap();

        let handle = store.load(Some(&forged), None, 100);
        assert!(handle.is_new);
        assert_ne!(handle.id, forged);
    }

    #[test]
    fn test_store_and_reload() {
        let store = SessionStore::default();
        let mut handle = store.load(None, None, 100);
        assert!(handle.is_new);

        let key = CacheKey::for_credential(&Credential::new("tok").unwrap());
        handle
            .session
            .put(key.clone(), SessionCacheEntry::new(Identity::anonymous(), 100));
        store.store(handle.id.clone(), handle.session, 100);

        let again = store.load(Some(&handle.id), None, 200);
        assert!(!again.is_new);
        assert_eq!(again.id, handle.id);
        assert!(again.session.get(&key).is_some());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        let key = CacheKey::for_credential(&Credential::new("tok").unwrap());

        let mut first = store.load(None, None, 0);
        first
            .session
            .put(key.clone(), SessionCacheEntry::new(Identity::anonymous(), 0));
        store.store(first.id.clone(), first.session, 0);

        let second = store.load(None, None, 0);
        assert!(second.session.get(&key).is_none());
    }

    #[test]
    fn test_idle_sessions_expire_and_sweep() {
        let store = SessionStore::new(Duration::from_secs(10));
        let handle = store.load(None, None, 0);
        store.store(handle.id.clone(), handle.session, 0);
        assert_eq!(store.len(), 1);

        let reloaded = store.load(Some(&handle.id), None, 10);
        assert!(reloaded.is_new);

        assert_eq!(store.sweep(5), 0);
        assert_eq!(store.sweep(10), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_credential_keys_session_without_cookie() {
        let store = SessionStore::default();
        let credential = Credential::new("tok-a").unwrap();
        let key = CacheKey::for_credential(&credential);

        let mut first = store.load(None, Some(&credential), 0);
        assert!(first.is_new);
        first
            .session
            .put(key.clone(), SessionCacheEntry::new(Identity::anonymous(), 0));
        store.store(first.id.clone(), first.session, 0);

        for now in 1..50 {
            let handle = store.load(None, Some(&credential), now);
            assert!(!handle.is_new);
            assert_eq!(handle.id, first.id);
            assert!(handle.session.get(&key).is_some());
            store.store(handle.id, handle.session, now);
        }
        assert_eq!(store.len(), 1);

        // An unknown cookie id falls back to the credential's session too
        let forged = SessionId::parse(&"b".repeat(SESSION_ID_LEN)).unwrap();
        assert_eq!(store.load(Some(&forged), Some(&credential), 60).id, first.id);

        let other = Credential::new("tok-b").unwrap();
        assert_ne!(store.load(None, Some(&other), 60).id, first.id);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let store = Arc::new(SessionStore::default());
        let ct = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_millis(10), ct.clone());

        ct.cancel();
        handle.await.unwrap();
    }
}
