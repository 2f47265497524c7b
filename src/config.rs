//! Process settings for ratekey.
//!
//! Per-route rate limiting configuration arrives with each API definition (see
//! [`crate::ratelimit::RateLimitConfig`]). The settings here cover the process
//! itself and are layered: built-in defaults, then an optional file, then
//! `RATEKEY__*` environment variables.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ratelimit::CredentialDecodePolicy;

/// Environment variable prefix for settings overrides.
pub const ENV_PREFIX: &str = "RATEKEY";

/// Main settings for the ratekey process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Key resolution settings
    #[serde(default)]
    pub resolver: ResolverSettings,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Text => write!(f, "text"),
        }
    }
}

/// Key resolution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// What to do when a `Basic` credential cannot be decoded
    #[serde(default)]
    pub credential_decode_failure: CredentialDecodePolicy,
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load settings, reading environment overrides under `env_prefix`.
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__"),
        );

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Text);
        assert_eq!(
            settings.resolver.credential_decode_failure,
            CredentialDecodePolicy::Unlimited
        );
    }

    #[test]
    fn test_load_without_sources() {
        let settings = Settings::load_with_prefix(None, "RATEKEY_TEST_EMPTY").unwrap();
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("ratekey-settings-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "logging:\n  level: debug\n  format: json\nresolver:\n  credential_decode_failure: abort"
        )
        .unwrap();

        let settings = Settings::load_with_prefix(Some(&path), "RATEKEY_TEST_FILE").unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.resolver.credential_decode_failure, CredentialDecodePolicy::Abort);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("RATEKEY_TEST_ENV__LOGGING__LEVEL", "warn");
        let settings = Settings::load_with_prefix(None, "RATEKEY_TEST_ENV").unwrap();
        std::env::remove_var("RATEKEY_TEST_ENV__LOGGING__LEVEL");

        assert_eq!(settings.logging.level, "warn");
    }
}
