//! Quota resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::rules::RateLimitConfig;

/// Marker meaning "unlimited / not applicable", distinct from zero.
pub const UNLIMITED: i64 = -1;

/// The rate limit applied to one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Requests allowed per window
    pub requests: i64,
    /// Window length in seconds
    pub window_seconds: i64,
    /// Lifetime of the session that holds the counter, in minutes
    pub session_ttl_minutes: i64,
}

impl Quota {
    /// Do not rate limit.
    pub const UNLIMITED: Quota = Quota {
        requests: UNLIMITED,
        window_seconds: UNLIMITED,
        session_ttl_minutes: UNLIMITED,
    };

    pub fn is_unlimited(&self) -> bool {
        *self == Self::UNLIMITED
    }

    /// Session lifetime as a duration, `None` when it never expires.
    pub fn session_ttl(&self) -> Option<Duration> {
        ttl_from_minutes(self.session_ttl_minutes)
    }
}

/// Convert a TTL in minutes into a duration.
///
/// Negative values never expire. So do values too large to represent in
/// seconds.
pub fn ttl_from_minutes(minutes: i64) -> Option<Duration> {
    u64::try_from(minutes)
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .map(Duration::from_secs)
}

/// Pick the quota for a request.
///
/// Returns [`Quota::UNLIMITED`] without an identity or when limiting is
/// inactive. Otherwise the first override whose resource equals
/// `override_path` and whose method equals `method` (both ignoring case)
/// wins, falling back to the configured default.
pub fn resolve_quota(
    config: &RateLimitConfig,
    override_path: &str,
    method: &str,
    identity: &str,
) -> Quota {
    if identity.is_empty() || !config.active {
        return Quota::UNLIMITED;
    }

    let ttl = config.session_ttl_minutes;
    let path = override_path.to_lowercase();

    config
        .overrides
        .iter()
        .find(|o| o.resource.to_lowercase() == path && o.method.eq_ignore_ascii_case(method))
        .map(|o| Quota {
            requests: o.requests,
            window_seconds: o.window_seconds,
            session_ttl_minutes: ttl,
        })
        .unwrap_or(Quota {
            requests: config.default_requests,
            window_seconds: config.default_window_seconds,
            session_ttl_minutes: ttl,
        })
}
