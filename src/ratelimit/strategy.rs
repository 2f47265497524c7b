//! Key derivation strategies.
//!
//! A strategy turns an inbound request into the identity string that buckets
//! the caller. Absence of the data a strategy looks for is not an error: it
//! yields an empty identity, which downstream means "do not rate limit this
//! request".

use base64::{engine::general_purpose::STANDARD, Engine};
use http::{header::AUTHORIZATION, HeaderMap, Request};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::rules::{Strategy, StrategyConfig, StrategyName};
use crate::error::{RatekeyError, Result};
use crate::logging::RequestLogger;

/// Suffix for credential-derived identities kept apart from SOAP callers.
pub const REST_SUFFIX: &str = "-rest";
/// Suffix for SOAP-derived identities kept apart from REST callers.
pub const SOAP_SUFFIX: &str = "-soap";

const TOKEN_PREFIXES: [&str; 2] = ["Bearer ", "Basic "];
const BASIC_PREFIX: &str = "Basic ";

static SESSION_GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<.*?:SessionGuid>(.*?)</.*?:SessionGuid>").expect("session guid pattern is valid")
});

static SOAP_USERNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[\w.-]+:)?Username>(.*?)</(?:[\w.-]+:)?Username>")
        .expect("username pattern is valid")
});

/// What to do when the credential strategy cannot decode `Authorization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialDecodePolicy {
    /// Log the failure and continue without an identity, which leaves the
    /// request unlimited.
    #[default]
    Unlimited,
    /// Surface the failure to the caller.
    Abort,
}

/// Runs the configured strategy against a request.
#[derive(Debug, Clone, Default)]
pub struct KeyDeriver {
    on_decode_error: CredentialDecodePolicy,
}

impl KeyDeriver {
    pub fn new(on_decode_error: CredentialDecodePolicy) -> Self {
        Self { on_decode_error }
    }

    /// Compute the identity for `request` with `strategy`.
    ///
    /// Body-reading strategies consume the body; nothing else in the pipeline
    /// reads it afterwards.
    pub async fn derive<B>(
        &self,
        strategy: &Strategy,
        request: &mut Request<B>,
        log: &RequestLogger,
    ) -> Result<String>
    where
        B: AsyncRead + Unpin + Send,
    {
        log.info(format_args!("strategy to be applied: {}", strategy.name));

        match &strategy.name {
            StrategyName::HeaderConcat => Ok(header_concat(&strategy.config, request.headers())),
            StrategyName::HeaderConcatCredential => {
                match credential_identity(&strategy.config, request.headers()) {
                    Ok(identity) => Ok(identity),
                    Err(err) => match self.on_decode_error {
                        CredentialDecodePolicy::Abort => Err(err),
                        CredentialDecodePolicy::Unlimited => {
                            log.error(format_args!("{}; no rate limit will be applied", err));
                            Ok(String::new())
                        }
                    },
                }
            }
            StrategyName::SessionToken => {
                let body = body_or_empty(request, log).await;
                let guid = session_guid(&body);
                if guid.is_empty() {
                    log.debug("no SessionGuid found");
                } else {
                    log.debug(format_args!("SessionGuid value: {}", guid));
                }
                Ok(guid)
            }
            StrategyName::SoapUsername => {
                let body = body_or_empty(request, log).await;
                let identity = soap_username(&body, strategy.config.combine_rest_with_soap);
                if identity.is_empty() {
                    log.debug("no Username found");
                }
                Ok(identity)
            }
            StrategyName::Unrecognized(name) => {
                log.info(format_args!("unknown strategy name: {:?}", name));
                Ok(String::new())
            }
        }
    }
}

/// Concatenate the configured headers with the configured separator.
///
/// Missing headers become empty segments. A leading `Bearer ` or `Basic ` is
/// stripped from each value.
pub fn header_concat(config: &StrategyConfig, headers: &HeaderMap) -> String {
    config
        .header_names
        .iter()
        .map(|name| strip_token_prefix(&header_value(headers, name)).to_string())
        .collect::<Vec<_>>()
        .join(&config.separator)
}

/// Decode the principal from a `Basic` credential.
///
/// The decoded credential has the form `principal|rest`; only the principal
/// is kept.
pub fn credential_identity(config: &StrategyConfig, headers: &HeaderMap) -> Result<String> {
    let raw = header_value(headers, AUTHORIZATION.as_str());
    let encoded = raw.strip_prefix(BASIC_PREFIX).unwrap_or(&raw);

    let decoded = STANDARD.decode(encoded).map_err(RatekeyError::CredentialDecode)?;
    let decoded = String::from_utf8_lossy(&decoded);
    let principal = decoded.split('|').next().unwrap_or_default();

    Ok(with_suffix(principal, REST_SUFFIX, config.combine_rest_with_soap))
}

/// Extract the first namespaced `SessionGuid` element from a SOAP body.
pub fn session_guid(body: &str) -> String {
    SESSION_GUID
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Extract the principal from the first `Username` element of a SOAP body.
pub fn soap_username(body: &str, combine_rest_with_soap: bool) -> String {
    let captured = SOAP_USERNAME
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let principal = captured.split('|').next().unwrap_or_default();

    with_suffix(principal, SOAP_SUFFIX, combine_rest_with_soap)
}

/// Read the whole body as text. Invalid UTF-8 is replaced, not rejected.
pub async fn read_body<B>(request: &mut Request<B>) -> Result<String>
where
    B: AsyncRead + Unpin + Send,
{
    let mut buf = Vec::new();
    request
        .body_mut()
        .read_to_end(&mut buf)
        .await
        .map_err(RatekeyError::BodyRead)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn body_or_empty<B>(request: &mut Request<B>, log: &RequestLogger) -> String
where
    B: AsyncRead + Unpin + Send,
{
    match read_body(request).await {
        Ok(body) => {
            log.debug(format_args!("request body: {}", body));
            body
        }
        Err(err) => {
            log.debug(format_args!("request body: NONE ({})", err));
            String::new()
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn strip_token_prefix(value: &str) -> &str {
    TOKEN_PREFIXES
        .iter()
        .find_map(|prefix| value.strip_prefix(prefix))
        .unwrap_or(value)
}

fn with_suffix(principal: &str, suffix: &str, combine_rest_with_soap: bool) -> String {
    if principal.is_empty() || combine_rest_with_soap {
        principal.to_string()
    } else {
        format!("{}{}", principal, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use http::HeaderValue;

    const CREDENTIAL: &str = "Basic TUlMRVNBSEVBRDF8UkRDX1dlYlNlcnZpY2VzOlJvYWRuZXQxNE5ldA==";

    fn logger() -> RequestLogger {
        RequestLogger::new("test-api", LogLevel::Debug)
    }

    fn strategy(name: &str) -> Strategy {
        Strategy {
            config: StrategyConfig {
                header_names: vec![
                    "x-tenant-id".to_string(),
                    "Host".to_string(),
                    "Content-Type".to_string(),
                    "Authorization".to_string(),
                ],
                separator: "::".to_string(),
                combine_rest_with_soap: false,
            },
            name: StrategyName::from(name.to_string()),
        }
    }

    fn request(body: &'static str) -> Request<&'static [u8]> {
        Request::builder()
            .method("GET")
            .uri("http://localhost:8080/hello/")
            .header("x-tenant-id", "milesahead1")
            .header("Content-Type", "application/json")
            .header("Authorization", "Bearer 123456abcd")
            .body(body.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_header_concat_keeps_order_and_empty_segments() {
        let req = request("");
        let key = header_concat(&strategy("requestHeaders").config, req.headers());
        assert_eq!(key, "milesahead1::::application/json::123456abcd");
    }

    #[test]
    fn test_header_concat_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("acme"));
        let config = StrategyConfig {
            header_names: vec!["X-Tenant-ID".to_string()],
            separator: "|".to_string(),
            combine_rest_with_soap: false,
        };
        assert_eq!(header_concat(&config, &headers), "acme");
    }

    #[test]
    fn test_header_concat_strips_prefix_once() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic Basic abc"));
        headers.insert("x-token", HeaderValue::from_static("Bearer12345abcd"));
        let config = StrategyConfig {
            header_names: vec!["Authorization".to_string(), "x-token".to_string()],
            separator: ",".to_string(),
            combine_rest_with_soap: false,
        };
        assert_eq!(header_concat(&config, &headers), "Basic abc,Bearer12345abcd");
    }

    #[test]
    fn test_credential_identity_rest_suffix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(CREDENTIAL));
        let mut config = strategy("requestHeadersXRS").config;

        assert_eq!(credential_identity(&config, &headers).unwrap(), "MILESAHEAD1-rest");

        config.combine_rest_with_soap = true;
        assert_eq!(credential_identity(&config, &headers).unwrap(), "MILESAHEAD1");
    }

    #[test]
    fn test_credential_identity_bad_base64() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic not*base64"));
        let err = credential_identity(&StrategyConfig::default(), &headers).unwrap_err();
        assert!(matches!(err, RatekeyError::CredentialDecode(_)));
    }

    #[test]
    fn test_credential_identity_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(credential_identity(&StrategyConfig::default(), &headers).unwrap(), "");
    }

    #[test]
    fn test_session_guid() {
        let body = r#"
      <soapenv:Header>
          <dat:SessionHeader>
              <dat:SessionGuid>33d9b8d0-58ba-4400-87af-bdf5f79c0f9b</dat:SessionGuid>
          </dat:SessionHeader>
      </soapenv:Header>"#;
        assert_eq!(session_guid(body), "33d9b8d0-58ba-4400-87af-bdf5f79c0f9b");
        assert_eq!(session_guid("<dat:SessionHeader></dat:SessionHeader>"), "");
    }

    #[test]
    fn test_soap_username() {
        let prefixed = "<wsse:Username>MILESAHEAD1|RDC_WebServices</wsse:Username>";
        assert_eq!(soap_username(prefixed, false), "MILESAHEAD1-soap");
        assert_eq!(soap_username(prefixed, true), "MILESAHEAD1");

        let bare = "<Username>acme</Username>";
        assert_eq!(soap_username(bare, false), "acme-soap");

        assert_eq!(soap_username("<Username></Username>", false), "");
        assert_eq!(soap_username("<Password>x</Password>", false), "");
    }

    #[tokio::test]
    async fn test_derive_session_token_from_body() {
        let mut req = request(
            "<soapenv:Header><dat:SessionGuid>33d9b8d0-58ba-4400-87af-bdf5f79c0f9b</dat:SessionGuid></soapenv:Header>",
        );
        let key = KeyDeriver::default()
            .derive(&strategy("sessionGuid"), &mut req, &logger())
            .await
            .unwrap();
        assert_eq!(key, "33d9b8d0-58ba-4400-87af-bdf5f79c0f9b");
    }

    #[tokio::test]
    async fn test_derive_body_read_failure_is_empty() {
        let body = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut req = Request::builder().uri("/orders").body(body).unwrap();

        let key = KeyDeriver::default()
            .derive(&strategy("soapRequestXRS"), &mut req, &logger())
            .await
            .unwrap();
        assert_eq!(key, "");
    }

    #[tokio::test]
    async fn test_derive_unknown_strategy_is_empty() {
        let mut req = request("");
        let key = KeyDeriver::default()
            .derive(&strategy("otherName"), &mut req, &logger())
            .await
            .unwrap();
        assert_eq!(key, "");
    }

    #[tokio::test]
    async fn test_derive_decode_policy() {
        let mut req = Request::builder()
            .uri("/orders")
            .header("Authorization", "Basic %%%")
            .body(&b""[..])
            .unwrap();
        let xrs = strategy("requestHeadersXRS");

        let key = KeyDeriver::new(CredentialDecodePolicy::Unlimited)
            .derive(&xrs, &mut req, &logger())
            .await
            .unwrap();
        assert_eq!(key, "");

        let result = KeyDeriver::new(CredentialDecodePolicy::Abort)
            .derive(&xrs, &mut req, &logger())
            .await;
        assert!(matches!(result, Err(RatekeyError::CredentialDecode(_))));
    }

    #[tokio::test]
    async fn test_body_is_read_once() {
        let mut req = request("<x:SessionGuid>abc</x:SessionGuid>");
        assert_eq!(read_body(&mut req).await.unwrap(), "<x:SessionGuid>abc</x:SessionGuid>");
        assert_eq!(read_body(&mut req).await.unwrap(), "");
    }
}
