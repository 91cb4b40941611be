//! Client configuration.
//!
//! Environment variables read by [`ClientOptions::from_env`]:
//! - `GOSCALEIO_ENDPOINT`: REST gateway base URL, e.g. `https://gw.example:443`.
//! - `GOSCALEIO_VERSION`: protocol version to pin (`major.minor`). Left empty,
//!   the version is negotiated after the first login.
//! - `GOSCALEIO_INSECURE`: `true` to skip TLS certificate verification.
//! - `GOSCALEIO_TIMEOUT_SECS`: per-request timeout in seconds. Defaults to 60.

use std::time::Duration;

/// Default bound on a single REST request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Options used to build a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the REST gateway.
    pub endpoint: String,
    /// Protocol version, empty until negotiated.
    pub version: String,
    /// Accept invalid TLS certificates.
    pub insecure: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            version: String::new(),
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Read options from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from an arbitrary key lookup. Unset or unparsable
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = lookup("GOSCALEIO_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self {
            endpoint: lookup("GOSCALEIO_ENDPOINT").unwrap_or_default(),
            version: lookup("GOSCALEIO_VERSION").unwrap_or_default(),
            insecure: lookup("GOSCALEIO_INSECURE").is_some_and(|v| v == "true"),
            timeout,
        }
    }
}
