//! Request-scoped logging.
//!
//! Each API definition carries its own verbosity. Rather than flipping a
//! process-wide level on every request, the level travels with the request in
//! a [`RequestLogger`] that is handed to every step of the pipeline. Records
//! that pass the route's level are emitted through `tracing`, so the installed
//! subscriber still has the final say.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Verbosity configured for a route.
///
/// On the wire this is an integer: `0` debug, `1` info, `2` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl From<i64> for LogLevel {
    fn from(value: i64) -> Self {
        match value {
            i64::MIN..=0 => LogLevel::Debug,
            1 => LogLevel::Info,
            _ => LogLevel::Error,
        }
    }
}

impl From<LogLevel> for i64 {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Error => 2,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Logger bound to a single request and the API definition that matched it.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    api: String,
    level: LogLevel,
}

impl RequestLogger {
    /// Create a logger for the named API at the given level.
    pub fn new(api: impl Into<String>, level: LogLevel) -> Self {
        Self {
            api: api.into(),
            level,
        }
    }

    /// The API definition this logger reports for.
    pub fn api(&self) -> &str {
        &self.api
    }

    /// Whether a record at `level` passes the route's threshold.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    pub fn debug(&self, message: impl fmt::Display) {
        if self.enabled(LogLevel::Debug) {
            debug!(api = %self.api, "{}", message);
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        if self.enabled(LogLevel::Info) {
            info!(api = %self.api, "{}", message);
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        if self.enabled(LogLevel::Error) {
            error!(api = %self.api, "{}", message);
        }
    }
}
