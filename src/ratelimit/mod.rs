//! Rate limit key derivation and quota resolution.

mod overrides;
mod quota;
mod resolver;
mod rules;
mod strategy;

pub use overrides::find_override_path;
pub use quota::{resolve_quota, ttl_from_minutes, Quota, UNLIMITED};
pub use resolver::{ApiDefinition, KeyResolver, RateLimitDecision};
pub use rules::{Override, RateLimitConfig, Strategy, StrategyConfig, StrategyName};
pub use strategy::{
    credential_identity, header_concat, read_body, session_guid, soap_username,
    CredentialDecodePolicy, KeyDeriver, REST_SUFFIX, SOAP_SUFFIX,
};
