// Transport configuration for building the underlying `reqwest::Client`.
//
// One configured base endpoint, a bounded per-request deadline, and JSON
// defaults. Deadline expiry surfaces as an ordinary transport failure,
// not a cancellation.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::Error;

/// Shared transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("opsdeck/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_deadline_is_ten_seconds() {
        assert_eq!(TransportConfig::default().timeout, Duration::from_secs(10));
    }

    #[test]
    fn builds_a_client() {
        TransportConfig::default().build_client().unwrap();
    }
}
