//! Ratekey - rate limit key derivation for API gateways
//!
//! This crate computes, for each inbound request, the identity a gateway
//! should count requests against and the quota that applies to it. Identities
//! come from request headers, `Basic` credentials or SOAP bodies; quotas come
//! from per-route defaults and resource/method overrides. Enforcement stays
//! with the gateway, which receives the result as a [`session::SessionState`].

pub mod config;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod plugin;
pub mod ratelimit;
pub mod session;
