//! Request fixtures for the command line.
//!
//! A fixture describes one inbound request in YAML:
//!
//! ```yaml
//! method: POST
//! path: /soap/orders
//! headers:
//!   Content-Type: text/xml
//! body: |
//!   <soapenv:Envelope>...</soapenv:Envelope>
//! ```

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use http::Request;
use serde::{Deserialize, Serialize};

use crate::error::{RatekeyError, Result};

/// A serialized inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFixture {
    /// HTTP method, `GET` when omitted
    #[serde(default = "default_method")]
    pub method: String,
    /// Path or absolute URI
    pub path: String,
    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body
    #[serde(default)]
    pub body: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestFixture {
    /// Parse a fixture from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RatekeyError::Fixture(e.to_string()))
    }

    /// Load a fixture from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Build the request the fixture describes.
    pub fn into_request(self) -> Result<Request<Cursor<Vec<u8>>>> {
        let mut builder = Request::builder().method(self.method.as_str()).uri(self.path.as_str());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(Cursor::new(self.body.into_bytes()))
            .map_err(|e| RatekeyError::Fixture(e.to_string()))
    }
}
