//! Session state shared by every request issued through a [`crate::Client`].
//!
//! [`SessionState`] owns the connection configuration, the current opaque
//! token, and the version-tagged request headers.  All three live behind one
//! mutex so a reader never observes a token from one login paired with
//! headers from another, and never sees `Accept` and `Content-Type` carrying
//! different versions.

use std::fmt;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;

/// Media type sent in `Accept` and `Content-Type`.
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// Leading `major.minor` of a server version string.
static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+).*$").expect("version regex is valid"));

/// Reduce a server version string to its leading `major.minor`.
///
/// `"3.6.700.103"` becomes `"3.6"`; a string without that prefix is returned
/// unchanged.
pub fn parse_version(raw: &str) -> String {
    VERSION_REGEX
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or_else(|| raw.to_owned(), |m| m.as_str().to_owned())
}

// ---------------------------------------------------------------------------
// Connection configuration
// ---------------------------------------------------------------------------

/// Where the cluster lives and how to log in to it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// REST gateway base URL.
    pub endpoint: String,
    /// Protocol version (`major.minor`), empty until negotiated.
    pub version: String,
    pub username: String,
    pub password: String,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        version: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            version: version.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether a username has been supplied, i.e. whether re-authentication
    /// is possible without caller involvement.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("version", &self.version)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Opaque token issued by `/api/login`. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// `Accept` / `Content-Type` pair derived from the protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub accept: String,
    pub content_type: String,
}

impl RequestHeaders {
    /// Headers for `version`; an empty version omits the `;version=` suffix.
    pub fn for_version(version: &str) -> Self {
        let value = if version.is_empty() {
            MEDIA_TYPE_JSON.to_owned()
        } else {
            format!("{MEDIA_TYPE_JSON};version={version}")
        };
        Self {
            accept: value.clone(),
            content_type: value,
        }
    }
}

/// Everything a request needs from the session, read under one lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub endpoint: String,
    pub headers: RequestHeaders,
    pub token: Option<SessionToken>,
    /// Bumped every time the token changes. Lets a caller that saw a 401
    /// tell whether somebody else has already logged in again.
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SessionInner {
    config: ConnectionConfig,
    token: Option<SessionToken>,
    headers: RequestHeaders,
    generation: u64,
}

/// Mutex-guarded session shared by all callers of one client.
#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<SessionInner>,
    /// Serialises logins so concurrent 401s trigger a single re-authentication.
    auth_lock: tokio::sync::Mutex<()>,
}

impl SessionState {
    pub fn new(config: ConnectionConfig) -> Self {
        let headers = RequestHeaders::for_version(&config.version);
        Self {
            inner: Mutex::new(SessionInner {
                config,
                token: None,
                headers,
                generation: 0,
            }),
            auth_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the connection configuration without logging in.
    ///
    /// An empty `config.version` keeps the version already negotiated for
    /// this session.
    pub fn configure(&self, mut config: ConnectionConfig) {
        let mut inner = self.lock();
        if config.version.is_empty() {
            config.version = inner.config.version.clone();
        }
        inner.headers = RequestHeaders::for_version(&config.version);
        inner.config = config;
    }

    pub fn config(&self) -> ConnectionConfig {
        self.lock().config.clone()
    }

    pub fn version(&self) -> String {
        self.lock().config.version.clone()
    }

    /// Store a new protocol version and re-derive the headers in the same
    /// critical section.
    pub fn set_version(&self, version: &str) {
        let mut inner = self.lock();
        inner.config.version = version.to_owned();
        inner.headers = RequestHeaders::for_version(version);
    }

    pub fn current_headers(&self) -> RequestHeaders {
        self.lock().headers.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            endpoint: inner.config.endpoint.clone(),
            headers: inner.headers.clone(),
            token: inner.token.clone(),
            generation: inner.generation,
        }
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.lock().token.clone()
    }

    /// Install `token` as the current token. An empty string clears it.
    pub fn set_token(&self, token: &str) {
        let mut inner = self.lock();
        inner.token = (!token.is_empty()).then(|| SessionToken::new(token));
        inner.generation += 1;
    }

    pub fn clear_token(&self) {
        self.set_token("");
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub(crate) async fn auth_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.auth_lock.lock().await
    }
}
