//! Per-request rate limit resolution.
//!
//! One pass per request: decode the route's configuration, derive the caller
//! identity, look up the resource override and resolve the quota. Nothing is
//! kept between requests.

use http::Request;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::{debug, instrument};

use super::overrides::find_override_path;
use super::quota::{resolve_quota, Quota};
use super::rules::RateLimitConfig;
use super::strategy::{CredentialDecodePolicy, KeyDeriver};
use crate::error::Result;
use crate::logging::RequestLogger;

/// The API definition the gateway matched for a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinition {
    /// Display name of the API
    #[serde(default)]
    pub name: String,
    /// Tags attached to the API
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque per-API configuration; rate limiting lives under `rateLimiting`
    #[serde(default)]
    pub config_data: serde_json::Value,
}

impl ApiDefinition {
    pub fn new(name: impl Into<String>, config_data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            config_data,
        }
    }
}

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Caller key; empty when the request is not rate limited
    pub identity: String,
    /// Matched override resource, empty when none matched
    pub override_path: String,
    /// Quota to enforce for `identity`
    pub quota: Quota,
}

impl RateLimitDecision {
    /// A decision that applies no limit.
    pub fn unlimited() -> Self {
        Self {
            identity: String::new(),
            override_path: String::new(),
            quota: Quota::UNLIMITED,
        }
    }
}

/// Resolves identity and quota for inbound requests.
///
/// Holds no per-request state and can be shared across tasks.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    deriver: KeyDeriver,
}

impl KeyResolver {
    /// Create a resolver with the given credential decode policy.
    pub fn new(on_decode_error: CredentialDecodePolicy) -> Self {
        Self {
            deriver: KeyDeriver::new(on_decode_error),
        }
    }

    /// Resolve the rate limit for `request` under `api`.
    ///
    /// Fails only when the configuration cannot be decoded, or when the
    /// credential cannot be decoded under [`CredentialDecodePolicy::Abort`].
    #[instrument(
        skip(self, api, request),
        fields(api = %api.name, method = %request.method(), path = %request.uri().path())
    )]
    pub async fn resolve<B>(
        &self,
        api: &ApiDefinition,
        request: &mut Request<B>,
    ) -> Result<RateLimitDecision>
    where
        B: AsyncRead + Unpin + Send,
    {
        let config = RateLimitConfig::from_value(&api.config_data)?;
        let log = RequestLogger::new(api.name.clone(), config.log_level);

        log.debug(format_args!("custom plugin BEGIN processing @ {}", chrono::Utc::now()));
        log.debug(format_args!("apidef tags: {:?}", api.tags));

        let decision = self.resolve_with_config(&config, request, &log).await?;

        log.info(format_args!("Unique KeyID: {}", decision.identity));
        log.debug(format_args!("custom plugin END processing @ {}", chrono::Utc::now()));
        Ok(decision)
    }

    /// Resolve the rate limit for `request` against an already decoded
    /// configuration.
    pub async fn resolve_with_config<B>(
        &self,
        config: &RateLimitConfig,
        request: &mut Request<B>,
        log: &RequestLogger,
    ) -> Result<RateLimitDecision>
    where
        B: AsyncRead + Unpin + Send,
    {
        if !config.active {
            log.info("No rate limit will be applied");
            return Ok(RateLimitDecision::unlimited());
        }

        let identity = self.deriver.derive(&config.strategy, request, log).await?;

        let override_path = find_override_path(request.uri().path(), &config.overrides).to_string();
        if !override_path.is_empty() {
            log.debug(format_args!("Override found for request: {}", override_path));
        }

        let quota = resolve_quota(config, &override_path, request.method().as_str(), &identity);

        debug!(
            requests = quota.requests,
            window_seconds = quota.window_seconds,
            session_ttl_minutes = quota.session_ttl_minutes,
            "Quota resolved"
        );

        Ok(RateLimitDecision {
            identity,
            override_path,
            quota,
        })
    }
}
