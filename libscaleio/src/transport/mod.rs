//! HTTP transport seam between the dispatcher and the network.
//!
//! [`HttpTransport`] performs exactly one HTTP exchange and knows nothing
//! about sessions, retries, or JSON.  [`ReqwestTransport`] is the production
//! implementation; tests plug in scripted transports.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::error::ScaleioError;

pub use http::ReqwestTransport;

/// A single outgoing request, already carrying every header it needs.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL, see [`join_url`].
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Join a request path onto an endpoint. Absolute URLs pass through.
///
/// `join_url("https://gw/", "api/login")` yields `https://gw/api/login`.
pub fn join_url(endpoint: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    let base = endpoint.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// One HTTP round trip.
///
/// Implementations return [`ScaleioError::Transport`] for anything that
/// prevented a response from arriving, and `Ok` for every response that did,
/// whatever its status.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScaleioError>;
}
