//! Gateway plugin entry point.

use std::sync::Arc;

use http::Request;
use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::error::Result;
use crate::ratelimit::{ApiDefinition, KeyResolver};
use crate::session::{SessionHandler, SessionState};

/// Computes the rate limit session for each request and hands it to the host.
pub struct RateLimitPlugin<H: SessionHandler> {
    resolver: KeyResolver,
    handler: Arc<H>,
}

impl<H: SessionHandler> RateLimitPlugin<H> {
    pub fn new(resolver: KeyResolver, handler: Arc<H>) -> Self {
        Self { resolver, handler }
    }

    /// The host collaborator sessions are handed to.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Resolve `request` under `api` and attach the resulting session.
    ///
    /// Requests without an identity still produce an unlimited session, so the
    /// host always has a decision to act on. Nothing is attached when the
    /// configuration cannot be decoded.
    pub async fn handle<B>(&self, api: &ApiDefinition, request: &mut Request<B>) -> Result<SessionState>
    where
        B: AsyncRead + Unpin + Send,
    {
        let decision = self.resolver.resolve(api, request).await.map_err(|e| {
            warn!(api = %api.name, error = %e, "Rate limit resolution failed");
            e
        })?;

        let session = SessionState::from(&decision);
        self.handler.set_session(session.clone()).await?;

        info!(
            api = %api.name,
            key_id = %session.key_id,
            rate = session.rate,
            per = session.per,
            "Rate limit session attached"
        );

        Ok(session)
    }
}
