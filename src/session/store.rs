//! In-memory session store.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use super::{SessionHandler, SessionState};
use crate::error::Result;

#[derive(Debug, Clone)]
struct StoredSession {
    state: SessionState,
    /// `None` means the session never expires
    expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Sessions indexed by key id.
///
/// Setting a session for a key that already exists replaces it and restarts
/// its lifetime. Sessions with an empty key id are not stored, since they
/// carry no limit.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `session`, computing its expiry relative to `now`.
    pub fn insert_at(&self, session: SessionState, now: DateTime<Utc>) {
        if session.key_id.is_empty() {
            trace!("Skipping session without key id");
            return;
        }

        let expires_at = session
            .lifetime()
            .and_then(|ttl| ChronoDuration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        debug!(
            key_id = %session.key_id,
            rate = session.rate,
            per = session.per,
            expires_at = ?expires_at,
            "Storing session"
        );

        self.sessions.insert(
            session.key_id.clone(),
            StoredSession {
                state: session,
                expires_at,
            },
        );
    }

    /// The live session for `key_id`, if any.
    pub fn get(&self, key_id: &str) -> Option<SessionState> {
        self.get_at(key_id, Utc::now())
    }

    /// The session for `key_id` as seen at `now`.
    pub fn get_at(&self, key_id: &str, now: DateTime<Utc>) -> Option<SessionState> {
        self.sessions
            .get(key_id)
            .filter(|stored| !stored.is_expired(now))
            .map(|stored| stored.state.clone())
    }

    /// Drop every session that has expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, stored| !stored.is_expired(now));
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
        removed
    }

    /// Number of stored sessions, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove all sessions.
    pub fn clear(&self) {
        self.sessions.clear();
    }
}

#[async_trait]
impl SessionHandler for MemorySessionStore {
    async fn set_session(&self, session: SessionState) -> Result<()> {
        self.insert_at(session, Utc::now());
        Ok(())
    }
}
