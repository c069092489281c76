//! The process-wide session store.
//!
//! A bounded LRU map from token to session. Expired entries are evicted
//! lazily by [`SessionStore::lookup`]; there is no sweep task. Eviction on
//! capacity is purely size-driven and silent.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use lru::LruCache;

use crate::session::{Session, Token};

/// Default bound on live sessions per server process.
pub const DEFAULT_CAPACITY: usize = 1000;

/// The store's clock. Swappable so tests can drive expiry deterministically.
pub type TimeFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock, used everywhere outside tests.
pub fn system_clock() -> TimeFn {
    Arc::new(Utc::now)
}

/// The result of a token lookup. `Expired` means the entry existed and was
/// just evicted; externally both `Expired` and `Absent` surface as the
/// same `Permission` answer, but the server logs them apart.
#[derive(Clone, Debug)]
pub enum Lookup {
    Live(Arc<Session>),
    Expired,
    Absent,
}

/// Thread-safe map from token to session. One instance per server process.
pub struct SessionStore {
    sessions: Mutex<LruCache<Token, Arc<Session>>>,
    now: TimeFn,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_capacity_and_clock(DEFAULT_CAPACITY, system_clock())
    }

    pub fn with_capacity_and_clock(capacity: usize, now: TimeFn) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).expect("default is non-zero"));
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            now,
        }
    }

    /// Insert a session, replacing any session with the same token. May
    /// silently evict the least recently used entry when full.
    pub fn add(&self, session: Arc<Session>) {
        let token = session.token().clone();
        self.sessions.lock().unwrap().put(token, session);
    }

    /// Fetch the session for `token`. An expired entry is removed and
    /// reported as [`Lookup::Expired`]; from that point on the token reads
    /// as absent. A live hit does not touch the session's expiry.
    pub fn lookup(&self, token: &Token) -> Lookup {
        let now = (self.now)();
        let mut sessions = self.sessions.lock().unwrap();
        let session = match sessions.get(token) {
            Some(session) => session.clone(),
            None => return Lookup::Absent,
        };
        if now >= session.expires() {
            sessions.pop(token);
            return Lookup::Expired;
        }
        Lookup::Live(session)
    }

    pub fn remove(&self, token: &Token) {
        self.sessions.lock().unwrap().pop(token);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sessions established over raw HTTP+TLS, keyed by the channel's TLS
/// "unique" binding value. Lets a reconnecting client on the same channel
/// skip signature verification.
pub struct BindingCache {
    inner: Mutex<LruCache<Vec<u8>, Arc<Session>>>,
}

impl BindingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).expect("default is non-zero"));
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, binding: &[u8]) -> Option<Arc<Session>> {
        self.inner.lock().unwrap().get(binding).cloned()
    }

    pub fn put(&self, binding: Vec<u8>, session: Arc<Session>) {
        self.inner.lock().unwrap().put(binding, session);
    }
}
