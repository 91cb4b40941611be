//! `reqwest`-backed transport used against a real REST gateway.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::ScaleioError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Sends requests over one pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport.
    ///
    /// With `insecure` set, certificates that fail verification are accepted.
    pub fn new(insecure: bool) -> Result<Self, ScaleioError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(ScaleioError::transport)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScaleioError> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(ScaleioError::transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(ScaleioError::transport)?;

        debug!(status, len = body.len(), "HTTP response received");
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
