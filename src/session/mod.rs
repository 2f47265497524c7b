//! Session hand-off to the host gateway.
//!
//! The gateway enforces limits against a session record keyed by the caller
//! identity. This module defines that record and the seam through which it is
//! handed over.

mod store;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ratelimit::{ttl_from_minutes, RateLimitDecision};

pub use store::MemorySessionStore;

/// Session record the gateway enforces against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Alias shown in gateway analytics
    pub alias: String,
    /// Key of the counter the gateway keeps for this caller
    pub key_id: String,
    /// Requests allowed per `per` seconds, `-1` for unlimited
    pub rate: i64,
    /// Window length in seconds, `-1` for unlimited
    pub per: i64,
    /// Minutes until the counter resets, `-1` for never
    pub session_lifetime_minutes: i64,
    /// Extra data carried with the session
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SessionState {
    /// Lifetime as a duration, `None` when the session never expires.
    pub fn lifetime(&self) -> Option<Duration> {
        ttl_from_minutes(self.session_lifetime_minutes)
    }
}

impl From<&RateLimitDecision> for SessionState {
    fn from(decision: &RateLimitDecision) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("keyId".to_string(), decision.identity.clone());

        Self {
            alias: decision.identity.clone(),
            key_id: decision.identity.clone(),
            rate: decision.quota.requests,
            per: decision.quota.window_seconds,
            session_lifetime_minutes: decision.quota.session_ttl_minutes,
            metadata,
        }
    }
}

/// Host collaborator that receives computed sessions.
///
/// Implementations attach the session to whatever the gateway uses to count
/// requests. They must be safe to call from many requests at once.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Attach `session` to the current request.
    async fn set_session(&self, session: SessionState) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::Quota;

    #[test]
    fn test_session_from_decision() {
        let decision = RateLimitDecision {
            identity: "MILESAHEAD1-rest".to_string(),
            override_path: "/resource-2/".to_string(),
            quota: Quota {
                requests: 5,
                window_seconds: 60,
                session_ttl_minutes: 120,
            },
        };

        let session = SessionState::from(&decision);
        assert_eq!(session.alias, "MILESAHEAD1-rest");
        assert_eq!(session.key_id, "MILESAHEAD1-rest");
        assert_eq!(session.rate, 5);
        assert_eq!(session.per, 60);
        assert_eq!(session.metadata.get("keyId").map(String::as_str), Some("MILESAHEAD1-rest"));
        assert_eq!(session.lifetime(), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn test_unlimited_session() {
        let session = SessionState::from(&RateLimitDecision::unlimited());
        assert_eq!(session.rate, -1);
        assert_eq!(session.per, -1);
        assert_eq!(session.lifetime(), None);
    }

    #[test]
    fn test_huge_lifetime_never_expires() {
        let mut session = SessionState::from(&RateLimitDecision::unlimited());
        session.session_lifetime_minutes = 1_000_000_000_000_000_000;
        assert_eq!(session.lifetime(), None);
    }

    #[test]
    fn test_session_json_names() {
        let session = SessionState::from(&RateLimitDecision::unlimited());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["keyId"], "");
        assert_eq!(json["sessionLifetimeMinutes"], -1);
    }
}
