//! Authenticated REST client.
//!
//! [`Client`] owns a [`SessionState`] and an [`HttpTransport`].  Every call
//! goes through [`Client::execute`] (or one of its wrappers), which attaches
//! the current token and version headers, and on a `401` logs in again with
//! the stored credentials and replays the request exactly once.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{Engine, engine::general_purpose};
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientOptions;
use crate::error::{ApiError, ScaleioError};
use crate::session::{ConnectionConfig, SessionSnapshot, SessionState, SessionToken, parse_version};
use crate::telemetry::TimeSpent;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, join_url};
use crate::types::HeaderContributor;

pub const LOGIN_PATH: &str = "/api/login";
pub const VERSION_PATH: &str = "/api/version";

/// Handle to one cluster's REST gateway.
///
/// Cloning is cheap; clones share the session, so a re-authentication
/// performed through one clone is visible to all of them.
#[derive(Clone)]
pub struct Client {
    session: Arc<SessionState>,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client talking to `options.endpoint` over HTTPS.
    ///
    /// No request is sent; call [`Client::authenticate_with`] before using
    /// the resource facades.
    pub fn new(options: ClientOptions) -> Result<Self, ScaleioError> {
        let transport = ReqwestTransport::new(options.insecure)?;
        Self::with_transport(options, Arc::new(transport))
    }

    /// Create a client on top of an arbitrary transport.
    pub fn with_transport(
        options: ClientOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ScaleioError> {
        if options.endpoint.is_empty() {
            return Err(ScaleioError::InvalidArgument("endpoint is required".into()));
        }
        debug!(
            endpoint = %options.endpoint,
            version = %options.version,
            insecure = options.insecure,
            "client init"
        );
        let config = ConnectionConfig::new(options.endpoint, options.version, "", "");
        Ok(Self {
            session: Arc::new(SessionState::new(config)),
            transport,
            timeout: options.timeout,
        })
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Replace the connection configuration. Does not log in.
    pub fn configure(&self, config: ConnectionConfig) -> Result<(), ScaleioError> {
        if config.endpoint.is_empty() {
            return Err(ScaleioError::InvalidArgument("endpoint is required".into()));
        }
        self.session.configure(config);
        Ok(())
    }

    /// Current token, if logged in.
    pub fn current_token(&self) -> Option<SessionToken> {
        self.session.token()
    }

    /// Install a token obtained elsewhere. An empty string clears it.
    pub fn set_token(&self, token: &str) {
        self.session.set_token(token);
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Store `config` and log in with its credentials.
    pub async fn authenticate_with(&self, config: ConnectionConfig) -> Result<(), ScaleioError> {
        self.configure(config)?;
        self.authenticate().await
    }

    /// Log in with the stored credentials.
    ///
    /// The previous token is dropped before the attempt, so a failed login
    /// always leaves the session unauthenticated.  When no protocol version
    /// is known yet it is negotiated right after the login succeeds.
    pub async fn authenticate(&self) -> Result<(), ScaleioError> {
        let _timer = TimeSpent::start("Authenticate");
        let _guard = self.session.auth_guard().await;
        self.login().await
    }

    /// Caller must hold the session's auth guard.
    #[instrument(skip(self))]
    async fn login(&self) -> Result<(), ScaleioError> {
        let config = self.session.config();
        self.session.clear_token();

        if !config.has_credentials() {
            return Err(ScaleioError::Authentication(
                "no credentials configured".into(),
            ));
        }

        let credentials = general_purpose::STANDARD
            .encode(format!("{}:{}", config.username, config.password));
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, basic_header(&credentials)?);

        let request = HttpRequest {
            method: Method::GET,
            url: join_url(&config.endpoint, LOGIN_PATH),
            headers,
            body: None,
            timeout: self.timeout,
        };
        let response = self.send(request).await?;
        if !response.is_success() {
            let err = ApiError::from_response(response.status, &response.body);
            warn!(status = response.status, "login rejected");
            return Err(ScaleioError::Authentication(format!("login rejected: {err}")));
        }

        let token = extract_string(&response.body)?;
        if token.is_empty() {
            return Err(ScaleioError::Authentication(
                "login returned an empty token".into(),
            ));
        }
        self.session.set_token(&token);

        if self.session.version().is_empty()
            && let Err(e) = self.update_version().await
        {
            self.session.clear_token();
            return Err(ScaleioError::Authentication(format!(
                "error getting version of the cluster: {e}"
            )));
        }

        info!(username = %config.username, version = %self.session.version(), "authenticated");
        Ok(())
    }

    /// Log in again after a 401, unless another caller already did so since
    /// `seen_generation` was read.
    async fn reauthenticate(&self, seen_generation: u64) -> Result<(), ScaleioError> {
        let _guard = self.session.auth_guard().await;
        if self.session.generation() != seen_generation && self.session.token().is_some() {
            debug!("session already refreshed by a concurrent caller");
            return Ok(());
        }
        let _timer = TimeSpent::start("Authenticate");
        self.login().await.map_err(|e| match e {
            ScaleioError::Authentication(_) => e,
            other => ScaleioError::Authentication(format!("re-authentication failed: {other}")),
        })
    }

    /// Snapshot the session, logging in first if there is no token.
    async fn ensure_session(&self) -> Result<SessionSnapshot, ScaleioError> {
        let snapshot = self.session.snapshot();
        if snapshot.token.is_some() {
            return Ok(snapshot);
        }
        if !self.session.config().has_credentials() {
            return Err(ScaleioError::Authentication(
                "not authenticated and no credentials configured".into(),
            ));
        }
        self.reauthenticate(snapshot.generation).await?;
        Ok(self.session.snapshot())
    }

    // -----------------------------------------------------------------------
    // Version
    // -----------------------------------------------------------------------

    /// Ask the gateway for its version, reduced to `major.minor`.
    pub async fn get_version(&self) -> Result<String, ScaleioError> {
        let snapshot = self.session.snapshot();
        let request = self.build_request(&Method::GET, VERSION_PATH, None, &[], &snapshot)?;
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ApiError::from_response(response.status, &response.body).into());
        }
        Ok(parse_version(&extract_string(&response.body)?))
    }

    /// Negotiate the version and re-derive request headers from it.
    pub async fn update_version(&self) -> Result<(), ScaleioError> {
        let version = self.get_version().await?;
        self.session.set_version(&version);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Execute one logical request and decode the JSON reply into `T`.
    ///
    /// An empty 2xx body decodes as JSON `null`, so `T = ()` fits action
    /// endpoints that return nothing.
    pub async fn execute<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ScaleioError>
    where
        B: Serialize + HeaderContributor + ?Sized,
        T: DeserializeOwned,
    {
        let (payload, extra) = encode_body(body)?;
        let response = self.dispatch(method, path, payload, &extra).await?;
        decode_json(&response.body)
    }

    /// Like [`Client::execute`] for endpoints that reply with a bare string.
    pub async fn execute_string<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, ScaleioError>
    where
        B: Serialize + HeaderContributor + ?Sized,
    {
        let (payload, extra) = encode_body(body)?;
        let response = self.dispatch(method, path, payload, &extra).await?;
        extract_string(&response.body)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ScaleioError> {
        self.execute::<serde_json::Value, T>(Method::GET, path, None)
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ScaleioError>
    where
        B: Serialize + HeaderContributor + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body)).await
    }

    /// Send, and on a 401 re-authenticate and send once more.
    #[instrument(skip_all, fields(%method, path))]
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        extra: &[(HeaderName, HeaderValue)],
    ) -> Result<HttpResponse, ScaleioError> {
        let snapshot = self.ensure_session().await?;
        let request = self.build_request(&method, path, body.clone(), extra, &snapshot)?;
        let response = self.send(request).await?;
        if response.status != 401 {
            return into_result(response);
        }

        info!(path, "session expired, re-authenticating");
        self.reauthenticate(snapshot.generation).await?;

        let snapshot = self.session.snapshot();
        let request = self.build_request(&method, path, body, extra, &snapshot)?;
        let response = self.send(request).await?;
        if response.status == 401 {
            let err = ApiError::from_response(response.status, &response.body);
            warn!(path, "still unauthorized after re-authentication");
            return Err(ScaleioError::Authentication(format!(
                "unauthorized after re-authentication: {err}"
            )));
        }
        into_result(response)
    }

    fn build_request(
        &self,
        method: &Method,
        path: &str,
        body: Option<Vec<u8>>,
        extra: &[(HeaderName, HeaderValue)],
        snapshot: &SessionSnapshot,
    ) -> Result<HttpRequest, ScaleioError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(&snapshot.headers.accept)?);
        headers.insert(CONTENT_TYPE, header_value(&snapshot.headers.content_type)?);
        if let Some(token) = &snapshot.token {
            let encoded = general_purpose::STANDARD.encode(format!(":{}", token.as_str()));
            headers.insert(AUTHORIZATION, basic_header(&encoded)?);
        }
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }
        Ok(HttpRequest {
            method: method.clone(),
            url: join_url(&snapshot.endpoint, path),
            headers,
            body,
            timeout: self.timeout,
        })
    }

    /// One transport round trip under the client timeout.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScaleioError> {
        let start = Instant::now();
        let method = request.method.clone();
        let url = request.url.clone();
        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| {
                ScaleioError::Transport(format!("request timed out after {:?}", self.timeout))
            })??;
        debug!(
            %method,
            %url,
            status = response.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request complete"
        );
        Ok(response)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ScaleioError> {
    HeaderValue::from_str(value)
        .map_err(|e| ScaleioError::InvalidArgument(format!("header value {value:?}: {e}")))
}

fn basic_header(encoded: &str) -> Result<HeaderValue, ScaleioError> {
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .map_err(|e| ScaleioError::InvalidArgument(format!("authorization header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

type EncodedBody = (Option<Vec<u8>>, Vec<(HeaderName, HeaderValue)>);

fn encode_body<B>(body: Option<&B>) -> Result<EncodedBody, ScaleioError>
where
    B: Serialize + HeaderContributor + ?Sized,
{
    match body {
        None => Ok((None, Vec::new())),
        Some(b) => {
            let payload = serde_json::to_vec(b)
                .map_err(|e| ScaleioError::InvalidArgument(format!("encode request body: {e}")))?;
            Ok((Some(payload), b.extra_headers()))
        }
    }
}

fn into_result(response: HttpResponse) -> Result<HttpResponse, ScaleioError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(response.status, &response.body).into())
    }
}

/// Decode a 2xx JSON body; an empty body reads as `null`.
pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ScaleioError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(ScaleioError::malformed)
}

/// Read a bare string reply such as `"abc"` or `3.6.700` with surrounding
/// whitespace and quotes stripped.
pub(crate) fn extract_string(body: &[u8]) -> Result<String, ScaleioError> {
    let s = std::str::from_utf8(body).map_err(ScaleioError::malformed)?;
    Ok(s.trim().trim_matches('"').to_owned())
}
