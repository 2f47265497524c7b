//! Per-route rate limiting configuration.
//!
//! The gateway attaches an opaque JSON document to every API definition. The
//! rate limiting part of that document lives under the `rateLimiting` key and
//! is decoded here into a [`RateLimitConfig`]. Field names on the wire are
//! stable and shared with existing gateway deployments.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::error::{RatekeyError, Result};
use crate::logging::LogLevel;

/// Rate limiting configuration for a single API definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Master switch; when false no identity or quota is computed
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    /// Resource/method specific quotas, first match wins
    #[serde(default, deserialize_with = "null_as_default")]
    pub overrides: Vec<Override>,
    /// Requests allowed per window when no override applies
    #[serde(default, rename = "requests", deserialize_with = "null_as_default")]
    pub default_requests: i64,
    /// Window length in seconds when no override applies
    #[serde(default, rename = "seconds", deserialize_with = "null_as_default")]
    pub default_window_seconds: i64,
    /// Lifetime of the rate limit session, in minutes
    #[serde(default, rename = "sessionTtlMin", deserialize_with = "null_as_default")]
    pub session_ttl_minutes: i64,
    /// Key derivation strategy
    #[serde(default, deserialize_with = "null_as_default")]
    pub strategy: Strategy,
    /// Verbosity for this route's request-scoped logging
    #[serde(default, deserialize_with = "null_as_default")]
    pub log_level: LogLevel,
}

/// A resource/method specific quota.
///
/// `-1` in `requests` or `window_seconds` means "unlimited" and is carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    /// HTTP method, compared case-insensitively
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,
    /// Requests allowed per window
    #[serde(default, deserialize_with = "null_as_default")]
    pub requests: i64,
    /// Path fragment, matched case-insensitively as a substring
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource: String,
    /// Window length in seconds
    #[serde(default, rename = "seconds", deserialize_with = "null_as_default")]
    pub window_seconds: i64,
}

/// Named key derivation strategy and its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: StrategyConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: StrategyName,
}

/// Strategy parameters. Each strategy only consults the fields it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    /// Headers concatenated by `requestHeaders`, in order
    #[serde(default, deserialize_with = "null_as_default")]
    pub header_names: Vec<String>,
    /// Joins header values for `requestHeaders`
    #[serde(default, deserialize_with = "null_as_default")]
    pub separator: String,
    /// Share one identity namespace between REST and SOAP callers
    #[serde(default, deserialize_with = "null_as_default")]
    pub combine_rest_with_soap: bool,
}

/// The closed set of key derivation strategies.
///
/// Names that do not match a known strategy are kept verbatim so they can be
/// reported, instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyName {
    /// `requestHeaders`
    HeaderConcat,
    /// `requestHeadersXRS`
    HeaderConcatCredential,
    /// `sessionGuid`
    SessionToken,
    /// `soapRequestXRS`
    SoapUsername,
    /// Anything else, including a missing name
    Unrecognized(String),
}

impl Default for StrategyName {
    fn default() -> Self {
        StrategyName::Unrecognized(String::new())
    }
}

impl StrategyName {
    /// The wire name of this strategy.
    pub fn as_str(&self) -> &str {
        match self {
            StrategyName::HeaderConcat => "requestHeaders",
            StrategyName::HeaderConcatCredential => "requestHeadersXRS",
            StrategyName::SessionToken => "sessionGuid",
            StrategyName::SoapUsername => "soapRequestXRS",
            StrategyName::Unrecognized(name) => name,
        }
    }

}

impl From<String> for StrategyName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "requestHeaders" => StrategyName::HeaderConcat,
            "requestHeadersXRS" => StrategyName::HeaderConcatCredential,
            "sessionGuid" => StrategyName::SessionToken,
            "soapRequestXRS" => StrategyName::SoapUsername,
            _ => StrategyName::Unrecognized(name),
        }
    }
}

impl From<StrategyName> for String {
    fn from(name: StrategyName) -> Self {
        match name {
            StrategyName::Unrecognized(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct Document {
    #[serde(default, rename = "rateLimiting", deserialize_with = "null_as_default")]
    rate_limiting: RateLimitConfig,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    #[serde(rename = "rateLimiting")]
    rate_limiting: &'a RateLimitConfig,
}

impl RateLimitConfig {
    /// Decode a configuration document from its JSON text.
    ///
    /// The error message is the decoder's own text so that callers can match
    /// on the syntactic cause.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<Document>(json)
            .map(|doc| doc.rate_limiting)
            .map_err(RatekeyError::config_parse)
    }

    /// Decode a configuration document that has already been parsed into JSON.
    ///
    /// `null` is an empty document.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Document::deserialize(value)
            .map(|doc| doc.rate_limiting)
            .map_err(RatekeyError::config_parse)
    }

    /// Load a configuration document from a file.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limiting configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serialize back into a `{"rateLimiting": {...}}` document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&DocumentRef {
            rate_limiting: self,
        })
        .map_err(RatekeyError::ConfigEncode)
    }

    /// Reject configurations that can never produce an identity.
    ///
    /// An inactive configuration is always valid, whatever strategy it names.
    pub fn validate(&self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        match &self.strategy.name {
            StrategyName::Unrecognized(name) => Err(RatekeyError::UnknownStrategy(name.clone())),
            _ => Ok(()),
        }
    }
}
